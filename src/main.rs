use std::fs::{self, File};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::info;
use simplelog::{Config, LevelFilter, WriteLogger};

use typeset_preview::export::{save_surface_png, save_text_layer_json};
use typeset_preview::panic_handler::initialize_panic_handler;
use typeset_preview::preview::{DocumentBackend, DocumentStatus, MupdfBackend};
use typeset_preview::settings::load_settings;
use typeset_preview::{Command, PreviewEngine, SourceRef};

#[derive(Parser)]
#[command(name = "typeset-preview", version, about = "Paginate compiled documents like the preview pane does")]
struct Cli {
    /// Settings file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Where log output goes
    #[arg(long, global = true, default_value = "typeset-preview.log")]
    log_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print page count and page sizes
    Info { file: PathBuf },

    /// Render every page and write PNG rasters plus text layers
    Render {
        file: PathBuf,

        /// Container width in CSS pixels
        #[arg(long, default_value_t = 800.0)]
        width: f64,

        /// Zoom percent (50 - 200)
        #[arg(long, default_value_t = 100)]
        zoom: u16,

        /// Device pixel ratio (defaults to the configured one)
        #[arg(long)]
        dpr: Option<f64>,

        /// Output directory
        #[arg(long)]
        out: PathBuf,

        /// Give up after this many seconds
        #[arg(long, default_value_t = 300)]
        timeout: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    WriteLogger::init(
        LevelFilter::Trace,
        Config::default(),
        File::create(&cli.log_file)
            .with_context(|| format!("cannot create log file {:?}", cli.log_file))?,
    )?;
    initialize_panic_handler();

    let settings = load_settings(cli.config.as_deref());
    log::set_max_level(settings.log_level_filter());
    info!("Starting typeset-preview");

    match cli.command {
        Commands::Info { file } => print_info(file),
        Commands::Render {
            file,
            width,
            zoom,
            dpr,
            out,
            timeout,
        } => {
            let mut engine = PreviewEngine::new(Arc::new(MupdfBackend::new()), settings.engine_config());
            if let Some(dpr) = dpr {
                engine.apply_command(Command::SetDevicePixelRatio(dpr));
            }
            engine.apply_command(Command::SetZoom(zoom));
            engine.apply_command(Command::ContainerResized(width));
            render(&mut engine, file, &out, Duration::from_secs(timeout))
        }
    }
}

fn print_info(file: PathBuf) -> Result<()> {
    let source = SourceRef::Path(file);
    let doc = MupdfBackend::new().open(&source)?;

    println!("{}: {} page(s)", source.label(), doc.page_count());
    for page in 1..=doc.page_count() {
        let size = doc.page(page)?.size();
        println!("  page {page}: {:.1} x {:.1}", size.width, size.height);
    }
    Ok(())
}

fn render(engine: &mut PreviewEngine, file: PathBuf, out: &std::path::Path, timeout: Duration) -> Result<()> {
    engine.apply_command(Command::LoadSource(Some(SourceRef::Path(file))));
    engine.run_until_idle(timeout);

    match engine.toolbar().status {
        DocumentStatus::Ready => {}
        DocumentStatus::Failed(reason) => bail!("{reason}"),
        status => bail!("document did not load in time ({status:?})"),
    }

    engine.mount_all_pages();
    engine.run_until_idle(timeout);
    if engine.is_busy() {
        bail!("rendering did not finish within {timeout:?}");
    }

    fs::create_dir_all(out).with_context(|| format!("cannot create {out:?}"))?;
    let pages: Vec<usize> = engine.pool().pages().collect();
    for page in pages {
        let Some(surface) = engine.surface(page) else {
            continue;
        };
        if !surface.is_painted() {
            log::warn!("Page {page} was not rendered, skipping");
            continue;
        }
        save_surface_png(surface, &out.join(format!("page-{page}.png")))?;
        if let Some(layer) = engine.text_layer(page) {
            save_text_layer_json(layer, &out.join(format!("page-{page}.text.json")))?;
        }
    }

    println!("{}", serde_json::to_string_pretty(&engine.toolbar())?);
    info!("Wrote {} page(s) to {out:?}", engine.pool().len());
    Ok(())
}
