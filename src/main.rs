use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode, Stdio};

use clap::Parser;
use htmldoc_export::{
    Error, ExportOptions, ExportRequest, Format, PageSize, PrintHost, Theme, WindowState,
};

#[derive(Parser, Debug)]
#[command(
    name = "htmldoc-export",
    version,
    about = "Export an HTML document with [Field] placeholders to PDF, PNG, DOCX or HTML"
)]
struct Cli {
    /// HTML input file (code fences are stripped)
    input: PathBuf,

    /// Output path; defaults to a name derived from the document title
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value_t = Format::Pdf)]
    format: Format,

    /// JSON object mapping placeholder names to values
    #[arg(long)]
    fields: Option<PathBuf>,

    /// Theme preset (professional, modern, classic, minimal)
    #[arg(long, default_value = "professional")]
    theme: String,

    /// JSON theme file; overrides --theme
    #[arg(long)]
    theme_file: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = PageSize::A4)]
    page_size: PageSize,

    /// Capture width in CSS pixels for PNG and canvas PDF
    #[arg(long, default_value_t = 794)]
    raster_width: u32,

    /// Device pixel ratio for PNG and canvas PDF
    #[arg(long, default_value_t = 2.0)]
    raster_scale: f32,

    /// Open a print page in the browser instead of writing a file
    #[arg(long)]
    print: bool,

    /// List the placeholders in the input and exit
    #[arg(long)]
    list_placeholders: bool,
}

/// Writes the print page to a temp file and hands it to the desktop opener.
struct SystemPrintHost;

impl PrintHost for SystemPrintHost {
    fn open(&self, page: &str) -> Result<WindowState, Error> {
        let path = std::env::temp_dir().join(format!("htmldoc-print-{}.html", std::process::id()));
        std::fs::write(&path, page)?;
        let mut cmd = if cfg!(target_os = "macos") {
            Command::new("open")
        } else if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.args(["/C", "start", ""]);
            c
        } else {
            Command::new("xdg-open")
        };
        match cmd
            .arg(&path)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(_) => Ok(WindowState::Opened),
            Err(e) => {
                log::warn!("Cannot launch a browser for {}: {e}", path.display());
                Ok(WindowState::Blocked)
            }
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    serde_json::from_str(&text).map_err(|e| format!("invalid JSON in {}: {e}", path.display()))
}

fn request(cli: &Cli) -> Result<ExportRequest, String> {
    let content = std::fs::read_to_string(&cli.input)
        .map_err(|e| format!("cannot read {}: {e}", cli.input.display()))?;
    let fields = match &cli.fields {
        Some(path) => Some(read_json::<HashMap<String, String>>(path)?),
        None => None,
    };
    let theme = match &cli.theme_file {
        Some(path) => read_json::<Theme>(path)?,
        None => Theme::preset(&cli.theme).ok_or_else(|| {
            let names: Vec<&str> = Theme::preset_names().collect();
            format!("unknown theme '{}' (expected one of {})", cli.theme, names.join(", "))
        })?,
    };
    Ok(ExportRequest {
        content,
        fields,
        theme,
        format: cli.format,
        options: ExportOptions {
            page_size: cli.page_size,
            raster_width: cli.raster_width,
            raster_scale: cli.raster_scale,
        },
    })
}

async fn run(cli: Cli) -> Result<(), String> {
    let request = request(&cli)?;

    if cli.list_placeholders {
        for name in htmldoc_export::placeholders(&request.content) {
            println!("{name}");
        }
        return Ok(());
    }

    if cli.print {
        return htmldoc_export::print(&request, &SystemPrintHost).map_err(|e| e.to_string());
    }

    let requested = request.format;
    log::debug!("Requesting {requested:?} export");
    let out = htmldoc_export::export(request)
        .await
        .map_err(|e| e.to_string())?;
    if out.blob.extension != format!("{requested:?}").to_lowercase() {
        log::warn!(
            "Requested {requested:?} but produced {} via {}",
            out.blob.mime,
            out.strategy
        );
    }
    let output = cli
        .output
        .unwrap_or_else(|| PathBuf::from(out.blob.file_name(&out.title)));
    std::fs::write(&output, &out.blob.bytes)
        .map_err(|e| format!("cannot write {}: {e}", output.display()))?;
    log::debug!("{} font faces indexed", htmldoc_export::fonts::indexed_faces());
    println!("{} ({}, {})", output.display(), out.blob.mime, out.strategy);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
