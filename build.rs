// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: target major version
fn to_arg() -> Arg {
    Arg::new("to")
        .long("to")
        .value_name("VERSION")
        .required(true)
        .help("Target major version")
}

/// Common argument: current major version
fn from_arg() -> Arg {
    Arg::new("from")
        .long("from")
        .value_name("VERSION")
        .help("Current major version (detected from package.json if omitted)")
}

fn flag(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .action(ArgAction::SetTrue)
        .help(help)
}

fn build_cli() -> Command {
    Command::new("upstep")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Upstep Contributors")
        .about("Upgrade a JavaScript project one major version at a time")
        .subcommand_required(true)
        .arg(
            Arg::new("project")
                .short('p')
                .long("project")
                .default_value(".")
                .global(true)
                .help("Project directory (must contain package.json)"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .global(true)
                .help("Config file (default: <project>/upstep.toml, then the user config)"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Debug logging"),
        )
        .subcommand(
            Command::new("migrate")
                .about("Upgrade the project to a target version")
                .arg(to_arg())
                .arg(from_arg())
                .arg(flag("dry-run", "Analyse and transform without writing the manifest or installing"))
                .arg(flag("continue-on-error", "Keep going after a failed step"))
                .arg(flag("allow-manual", "Install even when conflicts need manual work"))
                .arg(flag("no-backup", "Do not back up the project first"))
                .arg(flag("json", "Print the run report as JSON"))
                .arg(
                    Arg::new("yes")
                        .short('y')
                        .long("yes")
                        .action(ArgAction::SetTrue)
                        .help("Never prompt; use the default answer to every question"),
                ),
        )
        .subcommand(
            Command::new("plan")
                .about("Show the steps an upgrade would run")
                .arg(to_arg())
                .arg(from_arg()),
        )
        .subcommand(
            Command::new("check")
                .about("Analyse peer conflicts of the first step without changing anything")
                .arg(to_arg())
                .arg(from_arg())
                .arg(flag("json", "Print the resolution plan as JSON")),
        )
        .subcommand(
            Command::new("restore")
                .about("Restore a backup taken by an earlier run")
                .arg(Arg::new("backup").help("Backup directory or id (default: newest)"))
                .arg(flag("list", "List available backups")),
        )
        .subcommand(Command::new("steps").about("List the known upgrade steps"))
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("upstep.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
