use std::path::PathBuf;
use std::sync::Arc;

use classify::ClassificationStyle;
use clap::{Parser, Subcommand};
use engine::{Engine, EngineConfig, VisualizationSpec};
use foundation::{Dataset, DatasetShape};
use legend::{NumberFormat, interpret_color, interpret_width};
use params::{
    EndpointTemplate, FilterBinding, NoProviders, ParamData, ResolveOptions, resolve, update_url,
};
use selection::{FeatureSelector, InMemoryFeatureSource};
use serde_json::json;
use state::StateValue;
use tools::{overrides, parse_point, parse_rect, read_json};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Resolve, fetch, classify and select data-bound map layers")]
struct Args {
    /// JSON engine config; VIZBIND_* variables override it
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve an endpoint template against explicit values
    Resolve {
        template: String,

        /// Parameter value, `name=value` or `name=a,b`
        #[arg(long = "set")]
        set: Vec<String>,

        /// Rewrite this URL instead of rendering a fresh one
        #[arg(long)]
        current_url: Option<String>,
    },

    /// Compute bins for a JSON array of records
    Classify {
        dataset: PathBuf,

        #[arg(long, default_value = "continuous")]
        style: ClassificationStyle,

        /// Bin count (breaks per side for diverging)
        #[arg(long)]
        bins: Option<usize>,

        #[arg(long, default_value = "id")]
        id_field: String,

        #[arg(long, default_value = "value")]
        value_field: String,
    },

    /// Summarize a paint expression as legend stops
    Legend {
        expression: PathBuf,

        /// Treat the expression as a width expression
        #[arg(long)]
        width: bool,

        /// Cap on width stops
        #[arg(long)]
        stops: Option<usize>,

        /// Group thousands in labels
        #[arg(long)]
        grouped: bool,
    },

    /// Pick features from a JSON feature source
    Select {
        features: PathBuf,

        /// Source id within the features file
        #[arg(long)]
        source_id: String,

        /// Pointer pick: lon,lat
        #[arg(long, conflicts_with = "rect", required_unless_present = "rect")]
        point: Option<String>,

        /// Rectangle: minLon,minLat,maxLon,maxLat
        #[arg(long)]
        rect: Option<String>,
    },

    /// Fetch a template over HTTP and classify the result
    Fetch {
        template: String,

        /// Overrides the configured base URL
        #[arg(long)]
        base_url: Option<String>,

        #[arg(long = "set")]
        set: Vec<String>,

        #[arg(long, default_value = "continuous")]
        style: ClassificationStyle,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    config.apply_env()?;

    match args.command {
        Command::Resolve {
            template,
            set,
            current_url,
        } => cmd_resolve(&template, &set, current_url.as_deref())?,
        Command::Classify {
            dataset,
            style,
            bins,
            id_field,
            value_field,
        } => {
            let shape = DatasetShape {
                id_field,
                value_field,
            };
            let dataset = Dataset::from_json(&read_json(&dataset)?, &shape)?;
            let bins = config.classifier().classify(&dataset, style, bins)?;
            println!("{}", serde_json::to_string_pretty(&bins)?);
        }
        Command::Legend {
            expression,
            width,
            stops,
            grouped,
        } => {
            let expression = read_json(&expression)?;
            let format = if grouped {
                NumberFormat::grouped()
            } else {
                NumberFormat::default()
            };
            let legend = if width {
                interpret_width(&expression, stops)
            } else {
                interpret_color(&expression, &format)
            };
            match legend {
                Some(stops) => println!("{}", serde_json::to_string_pretty(&stops)?),
                None => println!("no legend"),
            }
        }
        Command::Select {
            features,
            source_id,
            point,
            rect,
        } => {
            let source: InMemoryFeatureSource = serde_json::from_value(read_json(&features)?)?;
            let selector = FeatureSelector::new(&source_id, "selection", config.selection_threshold_m);
            let picked = match (point, rect) {
                (Some(point), _) => selector
                    .select_at_point(&source, parse_point(&point)?)
                    .into_iter()
                    .collect(),
                (None, Some(rect)) => {
                    let (a, b) = parse_rect(&rect)?;
                    selector.select_in_rectangle(&source, a, b)
                }
                (None, None) => Vec::new(),
            };
            let ids: Vec<_> = picked
                .iter()
                .map(|f| json!({ "id": f.id, "label": f.label }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&ids)?);
        }
        Command::Fetch {
            template,
            base_url,
            set,
            style,
        } => {
            if let Some(url) = base_url {
                config.base_url = Some(url);
            }
            cmd_fetch(config, &template, &set, style).await?;
        }
    }

    Ok(())
}

fn cmd_resolve(
    template: &str,
    set: &[String],
    current_url: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let template = EndpointTemplate::parse(template)?;
    let options = ResolveOptions {
        overrides: overrides(set)?,
        ..ResolveOptions::default()
    };

    if let Some(current) = current_url {
        println!("{}", update_url(&template, current, &options.overrides));
        return Ok(());
    }

    let resolution = resolve(&template, &NoProviders, &options);
    let out = json!({
        "url": resolution.request.to_url(""),
        "signature": resolution.request.signature(),
        "ready": resolution.is_ready(),
        "missing": resolution.missing_names(),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

async fn cmd_fetch(
    config: EngineConfig,
    template: &str,
    set: &[String],
    style: ClassificationStyle,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = config
        .http_source()
        .ok_or("no base URL: pass --base-url or set VIZBIND_BASE_URL")?;
    let mut engine = Engine::new(config, Arc::new(source));

    // Each --set value lives in a store slot of the same name.
    let mut spec = VisualizationSpec::new("cli", template, style);
    for (name, data) in overrides(set)? {
        spec = spec.with_filter(FilterBinding::new(name.clone(), name.clone()));
        let value = match data {
            ParamData::One(s) => StateValue::Scalar(s),
            ParamData::Many(list) => StateValue::List(list),
        };
        engine.set(name, value);
    }
    engine.add_visualization(spec)?;
    if let Some(viz) = engine.visualization("cli") {
        let resolution = viz.resolve(engine.store());
        if !resolution.is_ready() {
            let missing = resolution.missing_names().join(", ");
            return Err(format!("missing required parameters: {missing}").into());
        }
    }

    let mut updates = engine.subscribe("cli").ok_or("visualization not registered")?;
    let state = updates.wait_for(|s| s.status.is_settled()).await?.clone();
    info!(status = ?state.status, "fetch settled");

    if let Some(err) = state.error {
        return Err(err.into());
    }
    let records = state.data.as_ref().map(|d| d.len()).unwrap_or(0);
    let bins = match engine.bins("cli") {
        Some(result) => Some(result?),
        None => None,
    };
    let out = json!({
        "status": format!("{:?}", state.status),
        "records": records,
        "bins": bins,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
