use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::{tempdir, TempDir};
use tracing_subscriber::prelude::*; // needed for .with()
use tracing_subscriber::{layer::Context, Layer, Registry};

const INDEX: &str = "theme_provider: Acme\nname: Acme Themes\npresent_themes:\n  abc: themes/abc.yml\n  night:\n    theme_path: themes/night.yml\n    markdown_path: night.md\n    category: dark\n";

/// A program directory, a synced provider and a settings file pointing at both.
/// Nothing here needs the network.
fn workspace() -> (TempDir, std::path::PathBuf) {
    let tmp = tempdir().expect("tempdir");
    let program = tmp.path().join("program");
    fs::create_dir_all(&program).unwrap();
    fs::write(program.join("peggle-roguelike-generator-1.0.jar"), b"jar").unwrap();

    let provider = tmp.path().join("providers/acme-themes");
    fs::create_dir_all(provider.join("themes")).unwrap();
    fs::write(provider.join("index.yml"), INDEX).unwrap();
    fs::write(provider.join("themes/abc.yml"), "abc").unwrap();
    fs::write(provider.join("themes/night.yml"), "night").unwrap();
    fs::write(provider.join("night.md"), "# Night").unwrap();

    let config = tmp.path().join("settings.yml");
    fs::write(
        &config,
        format!(
            "selected_program_dir: {}\ninstalled_theme_providers:\n  acme: acme/acme-themes\nproviders_root: {}\ndark_mode: false\n",
            program.display(),
            tmp.path().join("providers").display()
        ),
    )
    .unwrap();
    (tmp, config)
}

fn theme_sync(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("theme-sync").expect("Binary exists");
    cmd.arg("--config").arg(config).env("RUST_LOG", "warn");
    cmd
}

#[test]
fn list_themes_reads_synced_providers() {
    let (_tmp, config) = workspace();

    theme_sync(&config)
        .arg("list-themes")
        .assert()
        .success()
        .stdout(predicate::str::contains("acme/abc").and(predicate::str::contains("acme/night")));

    theme_sync(&config)
        .args(["list-themes", "--category", "dark"])
        .assert()
        .success()
        .stdout(predicate::str::contains("acme/night").and(predicate::str::contains("acme/abc").not()));

    theme_sync(&config)
        .args(["list-providers", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\": \"Acme Themes\""));
}

#[test]
fn install_single_theme_writes_asset_and_doc() {
    let (tmp, config) = workspace();

    theme_sync(&config)
        .args(["install", "acme", "night"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Installed night"));

    let dest = tmp.path().join("program/customThemes");
    assert_eq!(fs::read_to_string(dest.join("night.yml")).unwrap(), "night");
    assert!(fs::read_to_string(dest.join("night.html")).unwrap().contains("<h1>Night</h1>"));

    theme_sync(&config)
        .args(["install", "acme", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope"));
}

#[test]
fn install_all_without_program_dir_fails_fast() {
    let tmp = tempdir().unwrap();
    let config = tmp.path().join("settings.yml");
    fs::write(&config, "selected_program_dir: ''\n").unwrap();

    theme_sync(&config)
        .arg("install-all")
        .assert()
        .failure()
        .stdout(predicate::str::contains("No program directory selected"));
}

#[test]
fn provider_registration_round_trips_through_settings_file() {
    let tmp = tempdir().unwrap();
    let config = tmp.path().join("nested/settings.yml");

    theme_sync(&config)
        .args(["add-provider", "mine", "me/my-themes"])
        .assert()
        .success();
    let saved = fs::read_to_string(&config).unwrap();
    assert!(saved.contains("official_ivan: Ivan951236/PeggleRoguelikeThemes"));
    assert!(saved.contains("mine: me/my-themes"));

    theme_sync(&config)
        .args(["add-provider", "bad", "no-slash"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("owner/name"));

    theme_sync(&config).args(["remove-provider", "mine"]).assert().success();
    assert!(!fs::read_to_string(&config).unwrap().contains("mine"));

    theme_sync(&config)
        .args(["remove-provider", "mine"])
        .assert()
        .failure();
}

#[test]
fn set_program_dir_validates_the_directory() {
    let (tmp, config) = workspace();
    let elsewhere = tmp.path().join("elsewhere");
    fs::create_dir_all(&elsewhere).unwrap();
    fs::write(elsewhere.join("peggle-notes.txt"), "hi").unwrap();

    theme_sync(&config)
        .arg("set-program-dir")
        .arg(&elsewhere)
        .assert()
        .failure()
        .stderr(predicate::str::contains("No JAR file found"));

    theme_sync(&config)
        .arg("set-program-dir")
        .arg(tmp.path().join("program"))
        .assert()
        .success();
    assert!(tmp.path().join("program/themeProviders").is_dir());
}

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        use std::fmt::Write as FmtWrite;
        let mut msg = String::new();
        let _ = write!(&mut msg, "{:?}", event);
        self.events.lock().unwrap().push(msg);
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use theme_sync::cli::{run, Cli, Commands};

    let tmp = tempdir().unwrap();
    let cli = Cli {
        config: Some(tmp.path().join("missing.yml")),
        command: Commands::ListProviders { json: false },
    };

    let _ = run(cli).await;

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
