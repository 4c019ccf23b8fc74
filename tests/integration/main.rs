//! Integration tests for the gamecache CLI
//!
//! Every test gets its own config and registry under a temp dir. None of
//! them needs the copy tool: entries are driven through states that
//! populate and evict can settle without spawning it.

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct Sandbox {
        temp: TempDir,
    }

    impl Sandbox {
        fn new() -> Self {
            Self {
                temp: TempDir::new().unwrap(),
            }
        }

        fn path(&self, rel: &str) -> PathBuf {
            self.temp.path().join(rel)
        }

        fn gamecache(&self) -> Command {
            let mut cmd = cargo_bin_cmd!("gamecache");
            cmd.env("GAMECACHE_CONFIG", self.path("config/config.toml"))
                .env("GAMECACHE_REGISTRY", self.path("state/registry.json"))
                .env("CI", "1");
            cmd
        }

        /// Install dir with two files, registered as entry `42` on root `fast`
        fn with_entry(&self) -> PathBuf {
            let install = self.path("nas/Doom");
            fs::create_dir_all(install.join("base")).unwrap();
            fs::write(install.join("doom.exe"), vec![0u8; 2048]).unwrap();
            fs::write(install.join("base/doom.wad"), vec![1u8; 4096]).unwrap();

            self.gamecache()
                .args(["root", "add"])
                .arg(self.path("fast"))
                .assert()
                .success();
            self.gamecache()
                .args(["entry", "add", "42", "--title", "Doom", "--install-dir"])
                .arg(&install)
                .arg("--root")
                .arg(self.path("fast"))
                .assert()
                .success();
            install
        }
    }

    #[test]
    fn help_displays() {
        cargo_bin_cmd!("gamecache")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("mirror slow game installs"));
    }

    #[test]
    fn version_displays() {
        cargo_bin_cmd!("gamecache")
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("gamecache"));
    }

    #[test]
    fn config_path_follows_env() {
        let sandbox = Sandbox::new();
        sandbox
            .gamecache()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_init_then_show() {
        let sandbox = Sandbox::new();
        sandbox
            .gamecache()
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration initialized"));
        assert!(sandbox.path("config/config.toml").exists());

        sandbox
            .gamecache()
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));

        sandbox
            .gamecache()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[copier]").and(predicate::str::contains("robocopy")));
    }

    #[test]
    fn invalid_config_is_reported() {
        let sandbox = Sandbox::new();
        fs::create_dir_all(sandbox.path("config")).unwrap();
        fs::write(sandbox.path("config/config.toml"), "[cache\nthrottle = ").unwrap();

        sandbox
            .gamecache()
            .arg("status")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn out_of_range_copier_setting_is_reported() {
        let sandbox = Sandbox::new();
        fs::create_dir_all(sandbox.path("config")).unwrap();
        fs::write(
            sandbox.path("config/config.toml"),
            "[copier]\nsuccess_exit_max = 9\n",
        )
        .unwrap();

        sandbox
            .gamecache()
            .arg("status")
            .assert()
            .failure()
            .stderr(
                predicate::str::contains("Invalid configuration")
                    .and(predicate::str::contains("success_exit_max")),
            );
    }

    #[test]
    fn root_list_empty() {
        let sandbox = Sandbox::new();
        sandbox
            .gamecache()
            .args(["root", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cache roots configured"));
        sandbox
            .gamecache()
            .args(["root", "list", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::starts_with("[]"));
    }

    #[test]
    fn root_add_list_and_duplicate() {
        let sandbox = Sandbox::new();
        let fast = sandbox.path("fast");

        sandbox
            .gamecache()
            .args(["root", "add", "--max-fill", "85"])
            .arg(&fast)
            .assert()
            .success()
            .stdout(predicate::str::contains("max fill 85%"));
        assert!(fast.is_dir());

        sandbox
            .gamecache()
            .args(["root", "list", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains(fast.display().to_string()));

        sandbox
            .gamecache()
            .args(["root", "add"])
            .arg(&fast)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Cache root already exists"));
    }

    #[test]
    fn entry_add_and_list() {
        let sandbox = Sandbox::new();
        sandbox.with_entry();

        sandbox
            .gamecache()
            .args(["entry", "list", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("42\tEmpty"));

        sandbox
            .gamecache()
            .args(["entry", "list", "--format", "json"])
            .assert()
            .success()
            .stdout(
                predicate::str::contains("\"install_size\": 6144")
                    .and(predicate::str::contains("\"install_files\": 2")),
            );
    }

    #[test]
    fn entry_add_requires_known_root() {
        let sandbox = Sandbox::new();
        let install = sandbox.path("nas/Quake");
        fs::create_dir_all(&install).unwrap();

        sandbox
            .gamecache()
            .args(["entry", "add", "7", "--title", "Quake", "--install-dir"])
            .arg(&install)
            .arg("--root")
            .arg(sandbox.path("nowhere"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("Cache root not found"));
    }

    #[test]
    fn entry_add_duplicate_id() {
        let sandbox = Sandbox::new();
        let install = sandbox.with_entry();

        sandbox
            .gamecache()
            .args(["entry", "add", "42", "--title", "Doom II", "--install-dir"])
            .arg(&install)
            .arg("--root")
            .arg(sandbox.path("fast"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("Cache entry already exists: 42"));
    }

    #[test]
    fn populate_unknown_entry() {
        let sandbox = Sandbox::new();
        sandbox
            .gamecache()
            .args(["populate", "nope"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Cache entry not found: nope"));
    }

    #[test]
    fn set_state_rejects_bad_name() {
        let sandbox = Sandbox::new();
        sandbox
            .gamecache()
            .args(["entry", "set-state", "42", "hot"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("unknown state"));
    }

    #[test]
    fn populated_entry_populates_at_once_and_evicts() {
        let sandbox = Sandbox::new();
        sandbox.with_entry();
        let cache_dir = sandbox.path("fast/Doom");

        sandbox
            .gamecache()
            .args(["entry", "set-state", "42", "populated"])
            .assert()
            .success();
        assert!(cache_dir.join(".gamecache.Populated").exists());

        sandbox
            .gamecache()
            .args(["populate", "42"])
            .assert()
            .success()
            .stdout(predicate::str::contains("42 is Populated"));

        sandbox
            .gamecache()
            .args(["dirty", "42"])
            .assert()
            .success()
            .stdout(predicate::str::contains("no changes to write back"));

        sandbox
            .gamecache()
            .args(["evict", "42"])
            .assert()
            .success()
            .stdout(predicate::str::contains("42 is Empty"));
        assert!(!cache_dir.exists());

        sandbox
            .gamecache()
            .args(["entry", "list", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("42\tEmpty"));
    }

    #[test]
    fn marker_wins_over_registry() {
        let sandbox = Sandbox::new();
        sandbox.with_entry();

        let cache_dir = sandbox.path("fast/Doom");
        fs::create_dir_all(&cache_dir).unwrap();
        fs::write(cache_dir.join(".gamecache.Played"), b"").unwrap();

        sandbox
            .gamecache()
            .args(["entry", "list", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("42\tPlayed"));
    }

    #[test]
    fn root_with_entries_cannot_be_removed() {
        let sandbox = Sandbox::new();
        sandbox.with_entry();

        sandbox
            .gamecache()
            .args(["root", "remove"])
            .arg(sandbox.path("fast"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("still holds cache entries"));

        sandbox
            .gamecache()
            .args(["entry", "remove", "42"])
            .assert()
            .success();
        sandbox
            .gamecache()
            .args(["root", "remove"])
            .arg(sandbox.path("fast"))
            .assert()
            .success();
    }

    #[test]
    fn status_lists_roots_and_entries() {
        let sandbox = Sandbox::new();
        sandbox.with_entry();

        sandbox
            .gamecache()
            .arg("status")
            .assert()
            .success()
            .stdout(
                predicate::str::contains("available for caches")
                    .and(predicate::str::contains("Doom")),
            );
    }

    #[test]
    fn status_without_roots() {
        let sandbox = Sandbox::new();
        sandbox
            .gamecache()
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("No cache roots configured"));
    }
}
