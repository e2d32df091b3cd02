//! Command implementations

pub mod doctor;

pub mod entry;

pub mod info;

pub mod run;

pub mod status;

use changepr_core::workspace::PackageInfo;
use owo_colors::OwoColorize;

/// Print packages as an aligned name/version table.
pub fn print_package_table(packages: &[PackageInfo]) {
    let width = packages
        .iter()
        .map(|pkg| pkg.name.len())
        .max()
        .unwrap_or(0)
        .max("Package".len());

    println!("  {:<width$}  {}", "Package".bold(), "Version".bold());
    for pkg in packages {
        let marker = if pkg.private { " (private)" } else { "" };
        println!(
            "  {:<width$}  {}{}",
            pkg.name.cyan(),
            pkg.version.green(),
            marker.dimmed()
        );
    }
}
