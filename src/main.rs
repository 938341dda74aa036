//! Folio Reader CLI (for testing purposes only)
//!
//! Usage: folio-reader <file.txt|file.md> [font-size]

use std::env;
use std::process::ExitCode;

use folio_reader::{OpenOptions, Reader, ReaderConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "folio_reader=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("Usage: folio-reader <file.txt|file.md> [font-size]");
        return ExitCode::FAILURE;
    };

    let mut config = ReaderConfig::from_env();
    if let Some(size) = args.next() {
        match size.parse() {
            Ok(size) => config.font_size = size,
            Err(_) => {
                eprintln!("Invalid font size: {}", size);
                return ExitCode::FAILURE;
            }
        }
    }

    let reader = Reader::new(config);
    if let Err(err) = reader.open(&path, OpenOptions::new()) {
        eprintln!("Failed to open {}: {}", path, err);
        return ExitCode::FAILURE;
    }

    match summarize(&reader) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn summarize(reader: &Reader) -> folio_reader::error::Result<()> {
    let page_size = reader.page_size();
    println!(
        "{} pages at {}x{}, font size {}",
        reader.page_count()?,
        page_size.width,
        page_size.height,
        reader.font_size()
    );
    println!();

    for (index, chapter) in reader.chapters()?.iter().enumerate() {
        let progress = reader.chapter_progress(index)?;
        println!(
            "{:>3}. {:<40} page {:>4}  ({:>5.1}%)",
            index + 1,
            chapter.title,
            chapter.start_page + 1,
            progress * 100.0
        );
    }

    if let Some(text) = reader.page_view(0)?.text() {
        println!();
        println!("--- page 1 ---");
        println!("{}", text);
    }

    Ok(())
}
