use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::{error, info, warn};

use rasterworld::prelude::*;

#[derive(Parser, Debug)]
#[command(version, about = "Render a mesh with the rasterworld CPU rasterizer")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render one frame of a mesh to a PNG file
    Render {
        /// OBJ file to render; the unit cube when omitted
        model: Option<PathBuf>,
        /// RON render configuration
        #[arg(long, short)]
        config: Option<PathBuf>,
        /// Output PNG path
        #[arg(long, short, default_value = "frame.png")]
        output: PathBuf,
        /// Rotation around the X axis, in degrees
        #[arg(long, default_value_t = 25.0, allow_hyphen_values = true)]
        rotate_x: f64,
        /// Rotation around the Y axis, in degrees
        #[arg(long, default_value_t = 35.0, allow_hyphen_values = true)]
        rotate_y: f64,
        /// Uniform model scale
        #[arg(long, default_value_t = 0.5)]
        scale: f64,
        /// Mirror the finished frame to the configured device
        #[arg(long)]
        upload: bool,
    },
}

struct RenderArgs {
    model: Option<PathBuf>,
    config: Option<PathBuf>,
    output: PathBuf,
    rotate_x: f64,
    rotate_y: f64,
    scale: f64,
    upload: bool,
}

fn render(args: RenderArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => RenderConfig::load(path)?,
        None => RenderConfig::default(),
    };
    let mut scene = Scene::from_config(&config)?;

    let model = match &args.model {
        Some(path) => MeshModel::from_obj(path)?,
        None => MeshModel::cube(),
    };
    let mut placement = Transform::new();
    placement
        .set_position_xyz(0.0, 0.0, -3.0)
        .rotate_x(args.rotate_x.to_radians())
        .rotate_y(args.rotate_y.to_radians())
        .set_scale_uniform(args.scale);
    scene.add_model_with_transform(&model, &placement.to_matrix()?)?;

    // Keep pixels square, then map [-1, 1] onto the frame.
    let (width, height) = (config.width, config.height);
    let mut model_view = SquareMatrix::viewport(width, height, width as f64 / 2.0);
    model_view.mul_assign(&SquareMatrix::scaling(height as f64 / width as f64, 1.0, 1.0))?;
    scene.model_view_transform(&model_view)?;

    scene.build()?;

    if args.upload {
        if scene.frame().is_mirrored() {
            scene.frame_mut().upload()?;
        } else {
            warn!("--upload given but the configured device backend is Off");
        }
    }

    scene.frame().save_png(&args.output)?;
    info!("Wrote {}", args.output.display());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Render {
            model,
            config,
            output,
            rotate_x,
            rotate_y,
            scale,
            upload,
        } => render(RenderArgs {
            model,
            config,
            output,
            rotate_x,
            rotate_y,
            scale,
            upload,
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Render failed:\n{}", e.report());
            ExitCode::FAILURE
        }
    }
}
