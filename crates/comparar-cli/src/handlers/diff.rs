//! Diff command handler: compare two image files without a browser

use crate::error::{CliError, CliResult};
use crate::output::ProgressReporter;
use crate::DiffArgs;
use comparar::{compare, decode_png, encode_png, format_percentage, Capture, CompareOptions};
use std::path::Path;

/// Comparator options from the diff flags
pub fn diff_options(args: &DiffArgs) -> CliResult<CompareOptions> {
    for (name, value) in [
        ("--threshold", args.threshold),
        ("--per-pixel-threshold", args.per_pixel_threshold),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(CliError::invalid_argument(format!(
                "{name} must be between 0 and 1, got {value}"
            )));
        }
    }
    Ok(CompareOptions::default()
        .with_per_pixel_threshold(args.per_pixel_threshold)
        .with_include_anti_aliasing(args.include_aa))
}

fn load(path: &Path) -> CliResult<Capture> {
    let bytes = std::fs::read(path)
        .map_err(|e| CliError::comparison(format!("cannot read {}: {e}", path.display())))?;
    Ok(decode_png(&bytes)?)
}

/// Execute the diff command; returns `true` when the images match within the
/// threshold
pub fn execute_diff(reporter: &ProgressReporter, args: &DiffArgs) -> CliResult<bool> {
    let options = diff_options(args)?;
    let left = load(&args.left)?;
    let right = load(&args.right)?;
    let diff = compare(&left, &right, &options)?;

    let ratio = diff.diff_ratio();
    let different = ratio > args.threshold;

    if let Some(output) = &args.output {
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(output, encode_png(&diff.diff)?)?;
    }

    let message = format!(
        "{} vs {}: {} different ({} of {} pixels, {} anti-aliased ignored)",
        args.left.display(),
        args.right.display(),
        format_percentage(ratio),
        diff.num_diff_pixels,
        diff.diff.total_pixels(),
        diff.num_anti_aliased,
    );
    if different {
        reporter.failure(&format!(
            "{message} exceeds {} threshold",
            format_percentage(args.threshold)
        ));
    } else {
        reporter.success(&message);
    }
    if let Some(output) = &args.output {
        reporter.info(&format!("Diff image: {}", output.display()));
    }

    Ok(!different)
}
