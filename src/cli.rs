use crate::config::{load_config, Config};
use crate::input::{parse_document, read_source, write_tree_output, DocumentKind};
use crate::layout::{layout_with_config, FontSizer};
use crate::layout_dump::write_layout_dump;
use crate::normalize::normalize;
use crate::orchestrator::{render_all, TreeOutcome};
use crate::ir::RawNode;
use crate::render::{size_boxes, write_output_svg};
use crate::sbom::{build_dependency_trees, CyclePolicy, HierarchyOptions};
use crate::surface::{HostPage, SurfaceSize, TreeSection};
use crate::tree_render::{RenderContext, RenderReport};
use anyhow::Result;
use clap::{ArgAction, Parser, ValueEnum};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, info, warn};

const DEFAULT_TREE_OUTPUT: &str = "dependency_tree_output.json";

#[derive(Parser, Debug)]
#[command(
    name = "deptree",
    version,
    about = "Render dependency trees (tree JSON or CycloneDX SBOM) as diagrams"
)]
pub struct Args {
    /// Input file (.json) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file or directory. SVG and HTML go to stdout if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Config JSON file
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Surface width
    #[arg(short = 'w', long = "width")]
    pub width: Option<f32>,

    /// Surface height
    #[arg(short = 'H', long = "height")]
    pub height: Option<f32>,

    /// Give up on a surface after this many size checks (0 = never)
    #[arg(long = "max-retries")]
    pub max_retries: Option<u32>,

    /// Also write the tree JSON that was rendered
    #[arg(long = "emit-tree", num_args = 0..=1, default_missing_value = DEFAULT_TREE_OUTPUT)]
    pub emit_tree: Option<PathBuf>,

    /// Fail on circular SBOM dependencies instead of marking them
    #[arg(long = "strict-cycles")]
    pub strict_cycles: bool,

    /// Write the computed layout of each tree as JSON
    #[arg(long = "dump-layout")]
    pub dump_layout: Option<PathBuf>,

    /// More logging (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Svg,
    Png,
    Html,
}

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Svg => "svg",
            OutputFormat::Png => "png",
            OutputFormat::Html => "html",
        }
    }
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = load_config(args.config.as_deref())?;
    apply_overrides(&mut config, &args);

    let text = read_source(args.input.as_deref())?;
    let document = parse_document(&text)?;
    let options = HierarchyOptions {
        cycles: if args.strict_cycles {
            CyclePolicy::Fail
        } else {
            CyclePolicy::Annotate
        },
        ..Default::default()
    };
    let trees = trees_from_document(document, &options)?;

    if let Some(path) = &args.emit_tree {
        write_tree_output(&trees, path)?;
        info!(path = %path.display(), "tree JSON written");
    }

    let page = HostPage::with_viewport(SurfaceSize::new(config.render.width, config.render.height));
    let ctx = RenderContext::new(
        Rc::new(FontSizer::new(&config.theme)),
        config.theme.clone(),
        config.layout.clone(),
        config.render.retry_policy(),
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    let local = tokio::task::LocalSet::new();
    let outcomes = local.block_on(&runtime, async {
        match render_all(&page, &trees, &ctx) {
            Some(batch) => batch.join().await,
            None => Vec::new(),
        }
    });

    let drawn = drawn_trees(&page, &outcomes);
    if drawn.is_empty() {
        return Err(anyhow::anyhow!("No dependency trees could be rendered"));
    }
    info!(
        drawn = drawn.len(),
        scheduled = outcomes.len(),
        "rendering finished"
    );

    write_outputs(&args, &config, &page, &drawn)?;
    if let Some(path) = &args.dump_layout {
        dump_layouts(path, &trees, &drawn, &ctx)?;
    }
    Ok(())
}

fn init_tracing(verbosity: u8) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let default = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(width) = args.width {
        config.render.width = width;
    }
    if let Some(height) = args.height {
        config.render.height = height;
    }
    if let Some(max) = args.max_retries {
        config.render.max_retries = (max > 0).then_some(max);
    }
}

/// Turns the uploaded document into the array of trees handed to the renderer.
fn trees_from_document(document: Value, options: &HierarchyOptions) -> Result<Value> {
    match DocumentKind::classify(&document) {
        DocumentKind::Sbom => {
            let trees = build_dependency_trees(&document, options)?;
            debug!(trees = trees.len(), "SBOM converted");
            Ok(serde_json::to_value(trees)?)
        }
        DocumentKind::Trees if document.is_object() => {
            debug!("single tree object, wrapping in a collection");
            Ok(Value::Array(vec![document]))
        }
        DocumentKind::Trees => Ok(document),
    }
}

struct DrawnTree<'a> {
    section: TreeSection,
    report: &'a RenderReport,
}

fn drawn_trees<'a>(page: &HostPage, outcomes: &'a [TreeOutcome]) -> Vec<DrawnTree<'a>> {
    let Some(container) = page.trees_container() else {
        return Vec::new();
    };
    let sections = container.sections();
    outcomes
        .iter()
        .filter_map(|outcome| {
            let report = outcome.result.as_ref().ok()?;
            let section = sections
                .iter()
                .find(|section| section.surface.index() == outcome.index)?
                .clone();
            Some(DrawnTree { section, report })
        })
        .collect()
}

fn write_outputs(args: &Args, config: &Config, page: &HostPage, drawn: &[DrawnTree<'_>]) -> Result<()> {
    if args.output_format == OutputFormat::Html {
        let html = page.to_html(&config.theme.page_background, &config.theme.header_color);
        let output = args.output.as_deref().map(|path| {
            if path.is_dir() {
                path.join("dependency_trees.html")
            } else {
                path.to_path_buf()
            }
        });
        return write_output_svg(&html, output.as_deref());
    }

    let documents: Vec<String> = drawn
        .iter()
        .filter_map(|tree| tree.section.surface.document())
        .collect();

    if let [svg] = documents.as_slice()
        && args.output.as_deref().is_none_or(|path| !path.is_dir())
    {
        return match args.output_format {
            OutputFormat::Png => {
                let output = ensure_output(&args.output, "png")?;
                write_png(svg, &output, config)
            }
            _ => write_output_svg(svg, args.output.as_deref()),
        };
    }

    let indices: Vec<usize> = drawn.iter().map(|tree| tree.section.surface.index()).collect();
    let outputs = resolve_multi_outputs(args.output.as_deref(), args.output_format.extension(), &indices)?;
    for (svg, output) in documents.iter().zip(&outputs) {
        match args.output_format {
            OutputFormat::Png => write_png(svg, output, config)?,
            _ => write_output_svg(svg, Some(output))?,
        }
        debug!(path = %output.display(), "diagram written");
    }
    Ok(())
}

#[cfg(feature = "png")]
fn write_png(svg: &str, output: &Path, config: &Config) -> Result<()> {
    crate::render::write_output_png(svg, output, &config.theme)
}

#[cfg(not(feature = "png"))]
fn write_png(_svg: &str, _output: &Path, _config: &Config) -> Result<()> {
    Err(anyhow::anyhow!(
        "PNG output requires the `png` feature"
    ))
}

/// Lays each drawn tree out again at the bounds its render used and writes
/// the result next to the requested path.
fn dump_layouts(path: &Path, trees: &Value, drawn: &[DrawnTree<'_>], ctx: &RenderContext) -> Result<()> {
    let Some(entries) = trees.as_array() else {
        return Ok(());
    };
    let indices: Vec<usize> = drawn.iter().map(|tree| tree.section.surface.index()).collect();
    let outputs = if drawn.len() == 1 && !path.is_dir() {
        vec![path.to_path_buf()]
    } else {
        resolve_multi_outputs(Some(path), "json", &indices)?
    };

    for (tree, output) in drawn.iter().zip(&outputs) {
        let index = tree.section.surface.index();
        let Some(entry) = entries.get(index) else {
            warn!(index, "no input entry for drawn tree");
            continue;
        };
        let raw = RawNode::from_value(entry);
        let Some(canonical) = normalize(Some(&raw))? else {
            continue;
        };
        let positioned = layout_with_config(&canonical, tree.report.bounds, &ctx.layout)?;
        let boxes = size_boxes(&positioned, ctx.sizer.as_ref(), &ctx.theme);
        write_layout_dump(output, &positioned, &boxes)?;
    }
    Ok(())
}

fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!("Output path required for {} output", ext))
}

fn resolve_multi_outputs(output: Option<&Path>, ext: &str, indices: &[usize]) -> Result<Vec<PathBuf>> {
    let base = output.ok_or_else(|| anyhow::anyhow!("Output path required when rendering several trees"))?;
    if base.is_dir() {
        return Ok(indices
            .iter()
            .map(|idx| base.join(format!("tree-{}.{}", idx + 1, ext)))
            .collect());
    }
    let stem = base.file_stem().and_then(|s| s.to_str()).unwrap_or("tree");
    let parent = base.parent().unwrap_or_else(|| Path::new("."));
    Ok(indices
        .iter()
        .map(|idx| parent.join(format!("{}-{}.{}", stem, idx + 1, ext)))
        .collect())
}
