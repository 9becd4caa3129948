use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use image::{DynamicImage, ImageReader};
use ndarray::Array2;
use std::path::{Path, PathBuf};

use morphdetect::detection::annotate;
use morphdetect::filter::{self, Kernel, Padding};
use morphdetect::settings::SETTINGS_FILE_NAME;
use morphdetect::{MaskShape, ObjectDetector, Reporter, Settings};

#[derive(Parser)]
#[command(name = "morphdetect")]
#[command(about = "Count two reference objects in a scene with morphological operators")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Locate and count both objects in the scene
    Detect(DetectArgs),

    /// Apply a preset kernel to an image
    Filter(FilterArgs),

    /// Show or write the effective settings
    Settings {
        #[command(flatten)]
        settings: SettingsArgs,

        /// Print the settings file contents
        #[arg(long)]
        show: bool,

        /// Write the settings to this file
        #[arg(long, value_name = "FILE")]
        write: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct DetectArgs {
    /// First reference object
    #[arg(value_name = "OBJECT1")]
    object1: PathBuf,

    /// Second reference object
    #[arg(value_name = "OBJECT2")]
    object2: PathBuf,

    /// Scene to search
    #[arg(value_name = "SCENE")]
    scene: PathBuf,

    #[command(flatten)]
    settings: SettingsArgs,

    /// Directory for the result images
    #[arg(long, value_name = "DIR", default_value = "out")]
    out_dir: PathBuf,

    /// Save debug outputs to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,

    /// Font for the count labels (TTF/OTF)
    #[arg(long, value_name = "FILE")]
    font: Option<PathBuf>,
}

/// Settings file plus per-run overrides
#[derive(clap::Args)]
struct SettingsArgs {
    /// Settings file to start from
    #[arg(long, value_name = "FILE", default_value = SETTINGS_FILE_NAME)]
    settings_file: PathBuf,

    #[arg(long)]
    gamma: Option<f64>,

    /// Median blur kernel size (odd)
    #[arg(long)]
    blur: Option<u32>,

    /// Binarize gradient magnitude instead of brightness
    #[arg(long)]
    gradient: Option<bool>,

    #[arg(long)]
    threshold1: Option<u8>,

    #[arg(long)]
    threshold2: Option<u8>,

    /// Objects are dark on a bright background
    #[arg(long)]
    bright_background: Option<bool>,

    #[arg(long)]
    close_iterations: Option<u32>,

    #[arg(long)]
    open_iterations: Option<u32>,

    /// Number of grown scales tried per object
    #[arg(long)]
    dilate_iterations: Option<u32>,

    /// Number of shrunk scales tried per object
    #[arg(long)]
    erode_iterations: Option<u32>,

    #[arg(long)]
    dont_care_width: Option<u32>,

    /// Rotation increment in degrees
    #[arg(long)]
    rotation_step: Option<u32>,

    /// Working shape as WIDTHxHEIGHT
    #[arg(long, value_parser = parse_dims)]
    image_shape: Option<(u32, u32)>,

    /// Morphology mask as ROWSxCOLS
    #[arg(long, value_parser = parse_dims)]
    mask_shape: Option<(u32, u32)>,
}

impl SettingsArgs {
    fn resolve(&self) -> Settings {
        let mut s = Settings::load_from(&self.settings_file);
        if let Some(v) = self.gamma {
            s.gamma_correction = v;
        }
        if let Some(v) = self.blur {
            s.blur_kernel_size = v;
        }
        if let Some(v) = self.gradient {
            s.use_gradient_edge_detector = v;
        }
        if let Some(v) = self.threshold1 {
            s.threshold1 = v;
        }
        if let Some(v) = self.threshold2 {
            s.threshold2 = v;
        }
        if let Some(v) = self.bright_background {
            s.bright_background = v;
        }
        if let Some(v) = self.close_iterations {
            s.morph_close_iterations = v;
        }
        if let Some(v) = self.open_iterations {
            s.morph_open_iterations = v;
        }
        if let Some(v) = self.dilate_iterations {
            s.morph_dilate_iterations = v;
        }
        if let Some(v) = self.erode_iterations {
            s.morph_erode_iterations = v;
        }
        if let Some(v) = self.dont_care_width {
            s.dont_care_width = v;
        }
        if let Some(v) = self.rotation_step {
            s.rotation_step_degrees = v;
        }
        if let Some(v) = self.image_shape {
            s.image_shape = v;
        }
        if let Some((rows, cols)) = self.mask_shape {
            s.mask_shape = MaskShape::new(rows, cols);
        }
        s
    }
}

fn parse_dims(text: &str) -> Result<(u32, u32), String> {
    let (a, b) = text
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected AxB, got '{}'", text))?;
    let a = a.trim().parse().map_err(|e| format!("{}: {}", a, e))?;
    let b = b.trim().parse().map_err(|e| format!("{}: {}", b, e))?;
    Ok((a, b))
}

#[derive(clap::Args)]
struct FilterArgs {
    /// Path to input image file
    #[arg(value_name = "IMAGE")]
    image: PathBuf,

    #[arg(long, value_enum, default_value_t = KernelPreset::Laplacian3)]
    kernel: KernelPreset,

    #[arg(long, value_enum, default_value_t = PaddingArg::Zero)]
    padding: PaddingArg,

    #[arg(long, value_enum, default_value_t = OutputType::U8)]
    output_type: OutputType,

    /// Where to save the filtered image
    #[arg(long, value_name = "FILE")]
    out: PathBuf,
}

#[derive(Clone, Copy, ValueEnum)]
enum KernelPreset {
    Identity,
    Box3,
    Laplacian3,
    Laplacian5,
}

#[derive(Clone, Copy, ValueEnum)]
enum PaddingArg {
    Zero,
    Extended,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputType {
    /// Saturated 8-bit result
    U8,
    /// Floating-point result stretched onto 0..255
    Normalized,
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match args.command {
        Command::Detect(detect) => run_detect(detect, args.verbose),
        Command::Filter(filter) => run_filter(filter),
        Command::Settings {
            settings,
            show,
            write,
        } => {
            let resolved = settings.resolve();
            resolved.validate()?;
            if show || write.is_none() {
                print!("{}", resolved.to_lines());
            }
            if let Some(path) = write {
                resolved.save_to(&path)?;
            }
            Ok(())
        }
    }
}

fn load_image(path: &Path) -> anyhow::Result<DynamicImage> {
    log::debug!("Loading image: {}", path.display());
    let img = ImageReader::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?
        .decode()
        .map_err(|e| anyhow::anyhow!("Failed to decode image {}: {}", path.display(), e))?;
    log::debug!("Image loaded: {}x{}", img.width(), img.height());
    Ok(img)
}

fn run_detect(args: DetectArgs, verbose: bool) -> anyhow::Result<()> {
    let settings = args.settings.resolve();
    let object1 = load_image(&args.object1)?;
    let object2 = load_image(&args.object2)?;
    let scene = load_image(&args.scene)?;

    let font = match &args.font {
        Some(path) => Some(annotate::load_font(path)?),
        None => annotate::find_system_font(),
    };

    let mut detector = ObjectDetector::new().with_verbose(verbose).with_font(font);
    if let Some(dir) = args.debug_out {
        detector = detector.with_debug(dir);
    }

    let reporter = Reporter::new(
        |_| {},
        |p| log::debug!("Progress: {:.1}%", p),
    );
    let output = detector.detect(&object1, &object2, &scene, &settings, &reporter)?;

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("Failed to create {}", args.out_dir.display()))?;
    let out = |name: &str| args.out_dir.join(name);
    output.objects_composite.save(out("objects.png"))?;
    output.binary_masks.save(out("binary_masks.png"))?;
    output.closed_masks.save(out("closed_masks.png"))?;
    output.scene_binary.save(out("scene_binary.png"))?;
    output.scene_closed.save(out("scene_closed.png"))?;
    output.object1_hits.save(out("object1_hits.png"))?;
    output.object2_hits.save(out("object2_hits.png"))?;
    output.annotated_scene.save(out("scene_annotated.png"))?;

    println!("\n=== Object Detection Results ===");
    println!("{}", output.summary());
    if verbose {
        for d in &output.detections {
            println!(
                "  {:?} #{} at ({:.1}, {:.1})",
                d.kind, d.index, d.center.0, d.center.1
            );
        }
    }
    println!("Results saved to {}", args.out_dir.display());

    Ok(())
}

fn run_filter(args: FilterArgs) -> anyhow::Result<()> {
    let img = load_image(&args.image)?;

    let kernel = match args.kernel {
        KernelPreset::Identity => Kernel::identity(),
        KernelPreset::Box3 => Kernel::box_blur(3)?,
        KernelPreset::Laplacian3 => Kernel::laplacian3(),
        KernelPreset::Laplacian5 => Kernel::laplacian5(),
    };
    let padding = match args.padding {
        PaddingArg::Zero => Padding::Zero,
        PaddingArg::Extended => Padding::Extended,
    };

    let result: Array2<u8> = match args.output_type {
        OutputType::U8 => filter::filter_image(&img, &kernel, padding)?,
        OutputType::Normalized => {
            let raw: Array2<f64> = filter::filter_image(&img, &kernel, padding)?;
            filter::normalize_to_u8(&raw.view())
        }
    };

    filter::matrix_to_gray(&result.view())
        .save(&args.out)
        .with_context(|| format!("Failed to save {}", args.out.display()))?;
    println!("Filtered image saved to {}", args.out.display());
    Ok(())
}
