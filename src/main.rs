use anyhow::Context;
use artifact_renamer::cli::{Cli, Commands};
use artifact_renamer::config::Config;
use artifact_renamer::detector::ArtifactDetector;
use artifact_renamer::ocr::TesseractBackend;
use artifact_renamer::renamer::log::write_batch_log;
use artifact_renamer::renamer::{ArtifactRenamer, BatchOptions, RenameOptions};
use artifact_renamer::server;
use artifact_renamer_common::{BatchResult, PatternExtractor};
use clap::Parser;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load()?;

    match cli.command {
        Commands::Detect { image, show_text } => {
            if !image.exists() {
                anyhow::bail!("Image not found: {}", image.display());
            }

            let renamer = build_renamer(&config, cli.tesseract_cmd.as_deref())?;
            println!("🔍 Analyzing: {}", file_name(&image));

            let result = renamer
                .detector()
                .detect(&image)
                .with_context(|| format!("OCR failed for {}", image.display()))?;

            println!("\nDetection Results:");
            println!("  Site Number:     {}", result.site_number().unwrap_or("Not found"));
            println!("  Artifact Number: {}", result.artifact_number().unwrap_or("Not found"));
            println!("  Confidence:      {:.1}", result.confidence());

            let extension = image
                .extension()
                .map(|e| e.to_string_lossy().to_string())
                .unwrap_or_default();
            match result.file_name(&extension) {
                Some(name) => println!("\nProposed filename: {}", name),
                None => println!("\n⚠ Could not detect both site and artifact numbers"),
            }

            if show_text {
                println!("\nRaw OCR Text:\n{}", result.raw_text());
            }

            if !result.is_success() {
                std::process::exit(1);
            }
        }

        Commands::Rename {
            image,
            directory,
            output,
            pattern,
            dry_run,
            overwrite,
            no_backup,
            no_recursive,
            force,
            no_log,
        } => {
            let renamer = build_renamer(&config, cli.tesseract_cmd.as_deref())?;
            let options = RenameOptions {
                overwrite,
                backup: !no_backup,
                dry_run,
            };

            if let Some(image) = image {
                let outcome = renamer.rename_one(&image, output.as_deref(), &options);
                println!("{}", outcome.message);
                if !outcome.success {
                    std::process::exit(1);
                }
                return Ok(());
            }

            let Some(directory) = directory else {
                anyhow::bail!("Specify an image or --directory");
            };
            if !directory.is_dir() {
                anyhow::bail!("Directory not found: {}", directory.display());
            }

            if output.is_none() && !dry_run {
                println!("\n⚠️  You are about to rename files IN-PLACE (no --output given).");
                if overwrite && !no_backup {
                    println!(
                        "   Replaced files will be moved to a '{}' folder.",
                        config.backup_dir_name
                    );
                }
                println!("   Use --output to copy renamed files to a new folder instead.\n");

                if !force {
                    let proceed = Confirm::new()
                        .with_prompt("Continue with in-place renaming?")
                        .default(false)
                        .interact()?;
                    if !proceed {
                        println!("Operation cancelled.");
                        return Ok(());
                    }
                }
            }

            let batch = BatchOptions {
                pattern: pattern.unwrap_or_else(|| config.file_pattern.clone()),
                output_dir: output.clone(),
                recursive: !no_recursive,
                rename: options,
            };
            let result = run_batch(&renamer, &directory, &batch)?;

            println!("\nProcessed {} files:", result.total());
            println!("  ✓ Success: {}", result.success());
            println!("  ✗ Failed:  {}", result.failed());

            if cli.verbose || result.failed() > 0 || dry_run {
                println!("\nDetails:");
                for item in result.details() {
                    let mark = if item.success { "✓" } else { "✗" };
                    println!("  {} {}", mark, item.message);
                }
            }

            if !dry_run && !no_log && !result.is_empty() {
                let log_dir = output.as_deref().unwrap_or(&directory);
                match write_batch_log(log_dir, &directory, output.as_deref(), &result) {
                    Ok(path) => println!("\n📝 Log: {}", path.display()),
                    Err(e) => tracing::warn!("Could not write batch log: {}", e),
                }
            }

            if result.failed() > 0 {
                std::process::exit(1);
            }
        }

        Commands::Preview {
            directory,
            pattern,
            no_recursive,
        } => {
            if !directory.is_dir() {
                anyhow::bail!("Directory not found: {}", directory.display());
            }

            let renamer = build_renamer(&config, cli.tesseract_cmd.as_deref())?;
            let pattern = pattern.unwrap_or_else(|| config.file_pattern.clone());
            let batch = BatchOptions {
                pattern: pattern.clone(),
                output_dir: None,
                recursive: !no_recursive,
                rename: RenameOptions {
                    dry_run: true,
                    ..RenameOptions::default()
                },
            };
            let result = run_batch(&renamer, &directory, &batch)?;

            if result.is_empty() {
                println!("No files matching '{}' found in {}", pattern, directory.display());
                return Ok(());
            }

            print_preview(&directory, &result);
        }

        Commands::Serve { port, host } => {
            let renamer = build_renamer(&config, cli.tesseract_cmd.as_deref())?;
            let port = port.unwrap_or(config.web_port);

            println!("🌐 Artifact photo renamer");
            println!("   Open http://{}:{} in your browser", host, port);
            println!("   Press Ctrl+C to stop.\n");

            server::serve(renamer, &host, port).await?;
        }

        Commands::Config {
            set_tesseract_cmd,
            set_language,
            set_workers,
            show,
        } => {
            let mut config = config;
            let changed =
                set_tesseract_cmd.is_some() || set_language.is_some() || set_workers.is_some();

            if let Some(cmd) = set_tesseract_cmd {
                config.tesseract_cmd = Some(cmd);
            }
            if let Some(language) = set_language {
                config.ocr_language = language;
            }
            if let Some(workers) = set_workers {
                config.workers = workers;
            }

            if changed {
                config.save()?;
                println!("✔ 設定を保存しました: {}", Config::config_path()?.display());
            }

            if show || !changed {
                println!("設定:");
                println!("  tesseract: {}", config.tesseract_cmd());
                println!("  OCR言語: {}", config.ocr_language);
                println!("  PSM: {}", config.ocr_page_seg_mode);
                println!("  タイムアウト: {}秒", config.ocr_timeout_seconds);
                println!("  遺跡番号パターン: {}", config.site_pattern);
                println!("  遺物番号パターン: {}", config.artifact_pattern);
                println!("  対象ファイル: {}", config.file_pattern);
                println!("  ワーカー数: {}", config.workers);
                println!("  バックアップ先: {}/", config.backup_dir_name);
                println!("  Webポート: {}", config.web_port);
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "artifact_renamer=debug,artifact_renamer_common=debug"
    } else {
        "artifact_renamer=warn"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

/// 設定と --tesseract-cmd からリネーマを組み立てる
fn build_renamer(config: &Config, tesseract_cmd: Option<&str>) -> anyhow::Result<ArtifactRenamer> {
    let Some(cmd) = tesseract_cmd else {
        return Ok(ArtifactRenamer::from_config(config)?);
    };

    let extractor = PatternExtractor::new(&config.site_pattern, &config.artifact_pattern)?;
    let detector = ArtifactDetector::new(
        Box::new(TesseractBackend::from_config(config).with_command(cmd)),
        Box::new(extractor),
    );
    Ok(ArtifactRenamer::new(detector)
        .with_backup_dir_name(&config.backup_dir_name)
        .with_workers(config.workers))
}

/// 進捗バー付きで一括処理する
fn run_batch(
    renamer: &ArtifactRenamer,
    input: &Path,
    options: &BatchOptions,
) -> anyhow::Result<BatchResult> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")?
            .progress_chars("█▓░"),
    );

    let result = renamer.rename_batch(input, options, |p| {
        pb.set_length(p.total as u64);
        pb.set_position(p.done as u64);
        pb.set_message(file_name(p.path));
    });
    pb.finish_and_clear();

    Ok(result?)
}

fn print_preview(directory: &Path, result: &BatchResult) {
    println!("\nPreview of {} files in {}:\n", result.total(), directory.display());
    println!(
        "{:<30} {:<30} {:<12} {:<10} Status",
        "Original", "New Name", "Site", "Artifact"
    );
    println!("{}", "-".repeat(100));

    for item in result.details() {
        let status = if item.success {
            "✓ Ready".to_string()
        } else {
            format!("✗ {}", failure_label(item))
        };
        println!(
            "{:<30} {:<30} {:<12} {:<10} {}",
            file_name(&item.source),
            item.proposed_name().unwrap_or_else(|| "-".into()),
            item.site_number.as_deref().unwrap_or("-"),
            item.artifact_number.as_deref().unwrap_or("-"),
            status
        );
    }

    println!(
        "\n{}/{} files ready for renaming",
        result.success(),
        result.total()
    );
}

fn failure_label(item: &artifact_renamer_common::FileOutcome) -> &'static str {
    use artifact_renamer_common::FailureKind;
    match item.failure {
        Some(FailureKind::NoDetection) => "No identifiers",
        Some(FailureKind::OcrBackend) => "OCR failed",
        Some(FailureKind::DestinationConflict) => "Name taken",
        Some(FailureKind::Filesystem) | None => "Error",
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
