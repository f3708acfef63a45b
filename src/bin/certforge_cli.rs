//! CertForge CLI - Batch interface for front ends
//!
//! Commands: layouts, validate, place, preview, generate
//! Outputs JSON to stdout, logs to stderr
//! Returns 1 on configuration errors, 2 on validation or row failures

use base64::Engine as _;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use certforge_core::{
    data, logging,
    mapping::{CoordinateMapper, PlacementSession},
    pipeline::MANIFEST_FILE,
    BatchGenerator, BatchRequest, GenerationError, GeneratorConfig, Layout, LayoutRegistry, OutputFormat, PrintSpec, Template,
};

#[derive(Parser)]
#[command(name = "certforge-cli")]
#[command(about = "CertForge CLI - Certificate Batch Renderer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Generator config file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to layouts directory (overrides the config)
    #[arg(short, long)]
    layouts_dir: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List available layouts
    Layouts,

    /// Validate a layout against a template (and optionally a data header)
    Validate {
        /// Layout ID or path to a layout JSON file
        #[arg(short = 'L', long)]
        layout: String,

        /// Template image
        #[arg(short, long)]
        template: PathBuf,

        /// Data rows (JSON array of objects)
        #[arg(short, long)]
        data: Option<PathBuf>,
    },

    /// Place fields by canvas clicks and print the resulting layout
    Place {
        /// New layout ID
        #[arg(long)]
        id: String,

        #[arg(short, long)]
        template: PathBuf,

        /// Data rows; their header gives the placeable columns
        #[arg(short, long)]
        data: PathBuf,

        #[arg(long, default_value_t = 800)]
        canvas_width: u32,

        #[arg(long, default_value_t = 600)]
        canvas_height: u32,

        /// COLUMN@X,Y in canvas coordinates (repeatable)
        #[arg(long = "click")]
        clicks: Vec<String>,

        /// COLUMN=SIZE (repeatable)
        #[arg(long = "font-size")]
        font_sizes: Vec<String>,
    },

    /// Render the first data row and print it as a PNG data URL
    Preview {
        #[arg(short = 'L', long)]
        layout: String,

        #[arg(short, long)]
        template: PathBuf,

        #[arg(short, long)]
        data: PathBuf,
    },

    /// Render one artifact per data row
    Generate {
        #[arg(short = 'L', long)]
        layout: String,

        #[arg(short, long)]
        template: PathBuf,

        #[arg(short, long)]
        data: PathBuf,

        #[arg(short, long)]
        output_dir: PathBuf,

        /// png, jpg or pdf (defaults to the layout's format)
        #[arg(short, long)]
        format: Option<OutputFormat>,

        /// PDF page resolution
        #[arg(long)]
        dpi: Option<u32>,

        #[arg(long)]
        jpeg_quality: Option<u8>,

        /// Also write manifest.json into the output directory
        #[arg(long)]
        manifest: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = match &cli.config {
        Some(path) => match GeneratorConfig::load_from_path(path) {
            Ok(c) => c,
            Err(e) => return fail(format!("Failed to load config: {e}")),
        },
        None => GeneratorConfig::default(),
    };
    let layouts_dir = cli.layouts_dir.clone().unwrap_or_else(|| config.layout_dir.clone());

    let registry = match LayoutRegistry::load_from_dir(&layouts_dir) {
        Ok(r) => r,
        Err(e) => return fail(format!("Failed to load layouts: {e}")),
    };

    let generator = match BatchGenerator::from_config(&config) {
        Ok(g) => g,
        Err(e) => return fail(e.to_string()),
    };

    match cli.command {
        Commands::Layouts => {
            let layouts: Vec<_> = registry
                .list()
                .iter()
                .map(|l| {
                    serde_json::json!({
                        "id": l.id,
                        "name": l.name,
                        "version": l.layout_version,
                        "output": l.output,
                        "fields": l.fields.len(),
                    })
                })
                .collect();
            print_json(&layouts)
        }

        Commands::Validate { layout, template, data } => {
            let layout = match resolve_layout(&registry, &layout) {
                Ok(l) => l,
                Err(e) => return fail(e),
            };
            let template = match Template::load(&template) {
                Ok(t) => t,
                Err(e) => return fail(e.to_string()),
            };
            let columns = match data.as_deref().map(data::load_rows).transpose() {
                Ok(rows) => rows.filter(|r| !r.is_empty()).map(|r| data::header(&r)),
                Err(e) => return fail(e.to_string()),
            };

            match generator.validate(&template, &layout, columns) {
                Ok(result) => {
                    let code = print_json(&result);
                    if result.valid {
                        code
                    } else {
                        ExitCode::from(2) // Validation failure
                    }
                }
                Err(e) => fail_generation(&e),
            }
        }

        Commands::Place { id, template, data, canvas_width, canvas_height, clicks, font_sizes } => {
            let template = match Template::load(&template) {
                Ok(t) => t,
                Err(e) => return fail(e.to_string()),
            };
            let rows = match data::load_rows(&data) {
                Ok(r) => r,
                Err(e) => return fail(e.to_string()),
            };

            let (width, height) = template.dimensions();
            let mapper = CoordinateMapper::new(width, height, canvas_width, canvas_height);
            let mut session = PlacementSession::for_columns(data::header(&rows), mapper);

            for arg in &font_sizes {
                let Some((column, size)) = arg.split_once('=').and_then(|(c, s)| Some((c, s.trim().parse::<u32>().ok()?))) else {
                    return fail(format!("Invalid --font-size {arg}, expected COLUMN=SIZE"));
                };
                if let Err(e) = session.set_font_size(column, size) {
                    return fail(e.to_string());
                }
            }
            for arg in &clicks {
                let Some((column, x, y)) = parse_click(arg) else {
                    return fail(format!("Invalid --click {arg}, expected COLUMN@X,Y"));
                };
                if let Err(e) = session.select(column).and_then(|_| session.click(x, y)) {
                    return fail(e.to_string());
                }
            }

            let markers = session.markers();
            let layout = Layout::new(id, session.into_fields());
            print_json(&serde_json::json!({ "layout": layout, "markers": markers }))
        }

        Commands::Preview { layout, template, data } => {
            let layout = match resolve_layout(&registry, &layout) {
                Ok(l) => l,
                Err(e) => return fail(e),
            };
            let template = match Template::load(&template) {
                Ok(t) => t,
                Err(e) => return fail(e.to_string()),
            };
            let rows = match data::load_rows(&data) {
                Ok(r) => r,
                Err(e) => return fail(e.to_string()),
            };

            match generator.preview_png(&template, &layout, &rows) {
                Ok(png) => {
                    let encoded = base64::engine::general_purpose::STANDARD.encode(png);
                    print_json(&serde_json::json!({
                        "success": true,
                        "preview": format!("data:image/png;base64,{encoded}"),
                    }))
                }
                Err(e) => fail(e.to_string()),
            }
        }

        Commands::Generate { layout, template, data, output_dir, format, dpi, jpeg_quality, manifest } => {
            let layout = match resolve_layout(&registry, &layout) {
                Ok(l) => l,
                Err(e) => return fail(e),
            };

            let mut generator = generator;
            if dpi.is_some() || jpeg_quality.is_some() {
                let current = *generator.print_spec();
                match PrintSpec::from_user(dpi.unwrap_or(current.dpi), jpeg_quality.unwrap_or(current.jpeg_quality)) {
                    Ok(print) => generator = generator.with_print_spec(print),
                    Err(e) => return fail(e.to_string()),
                }
            }
            if manifest {
                generator = generator.with_manifest(true);
            }

            let request = BatchRequest {
                template_path: template,
                data_path: data,
                layout,
                output_dir,
                format,
            };

            match generator.generate(&request) {
                Ok(report) => {
                    eprintln!(
                        "{} of {} certificates generated, {} failed, {} skipped",
                        report.succeeded,
                        report.attempted,
                        report.errors.len(),
                        report.skipped.len()
                    );
                    for issue in report.first_errors(5) {
                        eprintln!("  row {}: {}", issue.row_index, issue.reason);
                    }
                    if manifest {
                        eprintln!("manifest: {}", request.output_dir.join(MANIFEST_FILE).display());
                    }

                    let clean = report.errors.is_empty();
                    let code = print_json(&serde_json::json!({ "success": true, "report": report }));
                    if clean {
                        code
                    } else {
                        ExitCode::from(2)
                    }
                }
                Err(e) => fail_generation(&e),
            }
        }
    }
}

/// A path to a layout file, or an ID in the registry.
fn resolve_layout(registry: &LayoutRegistry, layout: &str) -> Result<Layout, String> {
    let path = Path::new(layout);
    if path.is_file() {
        return Layout::load(path).map_err(|e| e.to_string());
    }
    registry
        .get(layout)
        .cloned()
        .ok_or_else(|| format!("Layout not found: {layout}"))
}

fn parse_click(arg: &str) -> Option<(&str, i32, i32)> {
    let (column, point) = arg.rsplit_once('@')?;
    let (x, y) = point.split_once(',')?;
    Some((column, x.trim().parse().ok()?, y.trim().parse().ok()?))
}

fn print_json(value: &impl serde::Serialize) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => fail(format!("Failed to serialize output: {e}")),
    }
}

/// Exit 2 for a rejected layout, 1 for every other configuration error.
fn fail_generation(error: &GenerationError) -> ExitCode {
    let code = fail(error.to_string());
    if error.is_validation() {
        ExitCode::from(2)
    } else {
        code
    }
}

fn fail(error: String) -> ExitCode {
    let output = serde_json::json!({
        "success": false,
        "error": error,
    });
    println!("{output}");
    ExitCode::FAILURE
}
