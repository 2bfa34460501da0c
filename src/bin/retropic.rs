use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "retropic", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a payload and print command statistics.
    Info(InfoArgs),
    /// Decode, replay, run the effect pipeline, and write a PNG.
    Frame(FrameArgs),
}

#[derive(Parser, Debug)]
struct InfoArgs {
    /// Input file containing the base64 payload.
    #[arg(long = "in")]
    in_path: PathBuf,

    #[arg(long, value_enum, default_value_t = EngineChoice::Sci0)]
    engine: EngineChoice,

    /// Compression method selector (0, 1, or 2).
    #[arg(long, default_value_t = 0)]
    compression: u8,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Input file containing the base64 payload.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    #[arg(long, value_enum, default_value_t = EngineChoice::Sci0)]
    engine: EngineChoice,

    /// Compression method selector (0, 1, or 2).
    #[arg(long, default_value_t = 0)]
    compression: u8,

    /// Replay only the first N commands (defaults to the whole picture).
    #[arg(long)]
    limit: Option<usize>,

    /// Pipeline configuration JSON; flags below override its fields.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum)]
    palette: Option<PaletteChoice>,

    #[arg(long)]
    grayscale: bool,

    #[arg(long, value_enum)]
    mixer: Option<MixerChoice>,

    /// Contrast factor in [0,1].
    #[arg(long)]
    contrast: Option<f32>,

    #[arg(long, value_enum)]
    dither: Option<DitherChoice>,

    #[arg(long, value_enum)]
    pre_scaler: Option<ScalerChoice>,

    #[arg(long, value_enum)]
    post_scaler: Option<ScalerChoice>,

    #[arg(long, value_enum)]
    blur: Option<BlurChoice>,

    /// Blur radius or sigma in [1,10].
    #[arg(long)]
    blur_amount: Option<f32>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EngineChoice {
    Sci0,
    Sci01,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PaletteChoice {
    Cga,
    TrueCga,
    Dga,
    Colly,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum MixerChoice {
    None,
    Mix10,
    Mix25,
    Mix50,
    Soft,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DitherChoice {
    #[value(name = "1x1")]
    D1x1,
    #[value(name = "2x2")]
    D2x2,
    #[value(name = "3x3")]
    D3x3,
    #[value(name = "4x4")]
    D4x4,
    #[value(name = "5x3")]
    D5x3,
    #[value(name = "5x4")]
    D5x4,
    #[value(name = "5x5")]
    D5x5,
    #[value(name = "5x6")]
    D5x6,
    #[value(name = "2x50")]
    D2x50,
    #[value(name = "50x3")]
    D50x3,
    #[value(name = "10x6")]
    D10x6,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ScalerChoice {
    None,
    #[value(name = "2x2")]
    Nearest2x,
    #[value(name = "3x3")]
    Nearest3x,
    #[value(name = "5x5")]
    Nearest5x5,
    #[value(name = "5x6")]
    Nearest5x6,
    Scale2x,
    Scale3x,
    Scale5x6,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BlurChoice {
    None,
    Box,
    Hbox,
    Gaussian,
    Hgaussian,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Info(args) => cmd_info(args),
        Command::Frame(args) => cmd_frame(args),
    }
}

fn read_payload(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("read payload '{}'", path.display()))
}

fn decode_picture(
    path: &Path,
    engine: EngineChoice,
    compression: u8,
) -> anyhow::Result<retropic::Picture> {
    let payload = read_payload(path)?;
    let engine = match engine {
        EngineChoice::Sci0 => retropic::Engine::Sci0,
        EngineChoice::Sci01 => retropic::Engine::Sci01,
    };
    Ok(retropic::Picture::decode(&payload, engine, compression)?)
}

fn cmd_info(args: InfoArgs) -> anyhow::Result<()> {
    let pic = decode_picture(&args.in_path, args.engine, args.compression)?;
    let mut lines = 0usize;
    let mut fills = 0usize;
    let mut brushes = 0usize;
    for command in pic.commands() {
        match command {
            retropic::DrawCommand::Polyline { .. } => lines += 1,
            retropic::DrawCommand::Fill { .. } => fills += 1,
            retropic::DrawCommand::Brush { .. } => brushes += 1,
        }
    }
    println!("commands: {}", pic.len());
    println!("  polylines: {lines}");
    println!("  fills:     {fills}");
    println!("  brushes:   {brushes}");
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let pic = decode_picture(&args.in_path, args.engine, args.compression)?;

    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("read config '{}'", path.display()))?;
            serde_json::from_str::<retropic::PipelineConfig>(&text)
                .with_context(|| "parse pipeline config JSON")?
        }
        None => retropic::PipelineConfig::default(),
    };
    apply_overrides(&mut config, &args);
    config.validate()?;

    let limit = args.limit.unwrap_or(pic.len());
    let raster = retropic::replay(pic.commands(), limit);
    let pipeline = retropic::Pipeline::build(&config)?;
    let frame = pipeline.run(&raster)?;

    if let Some(parent) = args.out.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        &args.out,
        &frame.data,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn apply_overrides(config: &mut retropic::PipelineConfig, args: &FrameArgs) {
    if let Some(p) = args.palette {
        config.palette = match p {
            PaletteChoice::Cga => retropic::PaletteKind::Cga,
            PaletteChoice::TrueCga => retropic::PaletteKind::TrueCga,
            PaletteChoice::Dga => retropic::PaletteKind::Dga,
            PaletteChoice::Colly => retropic::PaletteKind::Colly,
        };
    }
    if args.grayscale {
        config.grayscale = true;
    }
    if let Some(m) = args.mixer {
        config.mixer = match m {
            MixerChoice::None => retropic::MixerKind::None,
            MixerChoice::Mix10 => retropic::MixerKind::Mix10,
            MixerChoice::Mix25 => retropic::MixerKind::Mix25,
            MixerChoice::Mix50 => retropic::MixerKind::Mix50,
            MixerChoice::Soft => retropic::MixerKind::Soft,
        };
    }
    if let Some(c) = args.contrast {
        config.contrast = c;
    }
    if let Some(d) = args.dither {
        config.dither = match d {
            DitherChoice::D1x1 => retropic::DitherCell::C1x1,
            DitherChoice::D2x2 => retropic::DitherCell::C2x2,
            DitherChoice::D3x3 => retropic::DitherCell::C3x3,
            DitherChoice::D4x4 => retropic::DitherCell::C4x4,
            DitherChoice::D5x3 => retropic::DitherCell::C5x3,
            DitherChoice::D5x4 => retropic::DitherCell::C5x4,
            DitherChoice::D5x5 => retropic::DitherCell::C5x5,
            DitherChoice::D5x6 => retropic::DitherCell::C5x6,
            DitherChoice::D2x50 => retropic::DitherCell::C2x50,
            DitherChoice::D50x3 => retropic::DitherCell::C50x3,
            DitherChoice::D10x6 => retropic::DitherCell::C10x6,
        };
    }
    if let Some(s) = args.pre_scaler {
        config.pre_scaler = scaler_kind(s);
    }
    if let Some(s) = args.post_scaler {
        config.post_scaler = scaler_kind(s);
    }
    if let Some(b) = args.blur {
        config.blur = match b {
            BlurChoice::None => retropic::BlurKind::None,
            BlurChoice::Box => retropic::BlurKind::Box,
            BlurChoice::Hbox => retropic::BlurKind::HBox,
            BlurChoice::Gaussian => retropic::BlurKind::Gaussian,
            BlurChoice::Hgaussian => retropic::BlurKind::HGaussian,
        };
    }
    if let Some(a) = args.blur_amount {
        config.blur_amount = a;
    }
}

fn scaler_kind(choice: ScalerChoice) -> retropic::ScalerKind {
    match choice {
        ScalerChoice::None => retropic::ScalerKind::None,
        ScalerChoice::Nearest2x => retropic::ScalerKind::Nearest2x,
        ScalerChoice::Nearest3x => retropic::ScalerKind::Nearest3x,
        ScalerChoice::Nearest5x5 => retropic::ScalerKind::Nearest5x5,
        ScalerChoice::Nearest5x6 => retropic::ScalerKind::Nearest5x6,
        ScalerChoice::Scale2x => retropic::ScalerKind::Scale2x,
        ScalerChoice::Scale3x => retropic::ScalerKind::Scale3x,
        ScalerChoice::Scale5x6 => retropic::ScalerKind::Scale5x6,
    }
}
