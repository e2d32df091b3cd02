use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;

#[derive(Args, Debug)]
pub struct ManArgs {
    /// Output directory (default: dist/share/man/man1)
    #[arg(long = "out-dir", default_value = "dist/share/man/man1")]
    pub out_dir: PathBuf,
}

/// Render one section-1 page named `<stem>.1` into `dir`.
fn write_page(dir: &Path, stem: &str, cmd: clap::Command) -> Result<(), String> {
    let mut buffer = Vec::new();
    clap_mangen::Man::new(cmd)
        .render(&mut buffer)
        .map_err(|e| format!("render {stem}.1: {e}"))?;
    let path = dir.join(format!("{stem}.1"));
    fs::write(&path, buffer).map_err(|e| format!("{}: {e}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(())
}

pub fn cmd_man(args: ManArgs) -> Result<(), String> {
    let out_dir = crate::workspace_root().join(args.out_dir);
    fs::create_dir_all(&out_dir).map_err(|e| format!("{}: {e}", out_dir.display()))?;

    let cmd = changepr::command();
    let bin_name = cmd.get_name().to_string();
    write_page(&out_dir, &bin_name, cmd.clone())?;

    // changepr-run.1, changepr-status.1, ...
    for subcommand in cmd.get_subcommands() {
        let stem = format!("{bin_name}-{}", subcommand.get_name());
        write_page(&out_dir, &stem, subcommand.clone())?;
    }
    Ok(())
}
