use anyhow::{bail, Context, Result};
use astra_plugin::{
    linspace, AcquisitionGeometry, AngleUnit, AstraContext, AstraProjectorMC, AstraProjectorSimple, CpuToolbox,
    CpuToolboxConfig, Device, FillMode, Geometry, ImageGeometry, LinearOperator, ProjectorConfig,
};
use clap::{Arg, ArgMatches, Command};
use log::{info, warn};
use std::f64::consts::PI;
use std::path::Path;

fn main() -> Result<()> {
    env_logger::init();

    let geometry_args = [
        Arg::new("size")
            .long("size")
            .short('n')
            .value_name("N")
            .help("정사각 이미지 한 변의 복셀 수")
            .default_value("30"),
        Arg::new("angles")
            .long("angles")
            .short('a')
            .value_name("COUNT")
            .help("[0, π] 구간의 투영 각도 수")
            .default_value("180"),
        Arg::new("slices")
            .long("slices")
            .value_name("COUNT")
            .help("슬라이스 수 (0이면 2D)")
            .default_value("0"),
        Arg::new("channels")
            .long("channels")
            .short('c')
            .value_name("COUNT")
            .help("채널 수")
            .default_value("1"),
        Arg::new("device")
            .long("device")
            .short('d')
            .value_name("DEVICE")
            .help("cpu, gpu, gpu:N")
            .default_value("cpu"),
        Arg::new("config")
            .long("config")
            .value_name("FILE")
            .help("프로젝터 구성 JSON"),
        Arg::new("memory-budget")
            .long("memory-budget")
            .value_name("BYTES")
            .help("툴박스 버퍼 메모리 상한"),
    ];

    let matches = Command::new("astra_demo")
        .version("0.1.0")
        .about("ASTRA 어댑터 데모: 평행빔 순/역투영과 연산자 노름")
        .subcommand_required(true)
        .subcommand(
            Command::new("project")
                .about("균일 원판 팬텀을 순투영한 뒤 역투영")
                .args(geometry_args.clone()),
        )
        .subcommand(
            Command::new("norm")
                .about("거듭제곱법으로 연산자 노름 추정")
                .args(geometry_args),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("project", sub)) => handle_project(sub),
        Some(("norm", sub)) => handle_norm(sub),
        _ => bail!("unknown subcommand"),
    }
}

struct Setup {
    context: AstraContext,
    ig: ImageGeometry,
    ag: AcquisitionGeometry,
    config: ProjectorConfig,
}

fn parse_usize(matches: &ArgMatches, name: &str) -> Result<usize> {
    let raw = matches
        .get_one::<String>(name)
        .with_context(|| format!("missing --{}", name))?;
    raw.parse()
        .with_context(|| format!("--{} expects a non-negative integer, got '{}'", name, raw))
}

fn setup(matches: &ArgMatches) -> Result<Setup> {
    let size = parse_usize(matches, "size")?;
    let angles = parse_usize(matches, "angles")?;
    let slices = parse_usize(matches, "slices")?;
    let channels = parse_usize(matches, "channels")?;
    let device: Device = matches
        .get_one::<String>("device")
        .map(String::as_str)
        .unwrap_or("cpu")
        .parse()?;

    let config = match matches.get_one::<String>("config") {
        Some(path) => ProjectorConfig::from_file(Path::new(path))?,
        None => ProjectorConfig::default(),
    };
    let memory_budget_bytes = match matches.get_one::<String>("memory-budget") {
        Some(raw) => Some(raw.parse().with_context(|| format!("invalid memory budget '{}'", raw))?),
        None => None,
    };
    if let Device::Gpu { .. } = device {
        warn!("{} requested; the reference toolbox computes on the CPU", device);
    }

    let angles = linspace(0.0, PI, angles);
    let mut ig = ImageGeometry::new(size, size);
    let mut ag = if slices > 0 {
        ig = ig.with_slices(slices);
        AcquisitionGeometry::parallel_3d(&angles, AngleUnit::Radian, size, slices)
    } else {
        AcquisitionGeometry::parallel_2d(&angles, AngleUnit::Radian, size)
    };
    if channels > 1 {
        ig = ig.with_channels(channels);
        ag = ag.with_channels(channels);
    }

    let toolbox = CpuToolbox::new(CpuToolboxConfig { memory_budget_bytes });
    Ok(Setup {
        context: AstraContext::with_toolbox(toolbox, device),
        ig,
        ag,
        config,
    })
}

fn handle_project(matches: &ArgMatches) -> Result<()> {
    let Setup { context, ig, ag, config } = setup(matches)?;
    if ig.channels > 1 {
        let op = AstraProjectorMC::with_config(&ig, &ag, &context, config)?;
        return report_projection(&op, &ig);
    }
    let op = AstraProjectorSimple::with_config(&ig, &ag, &context, config)?;
    report_projection(&op, &ig)
}

fn report_projection<Op>(op: &Op, ig: &ImageGeometry) -> Result<()>
where
    Op: LinearOperator<Domain = ImageGeometry, Range = AcquisitionGeometry>,
{
    let mut phantom = ig.allocate(FillMode::Zeros);
    let radius = ig.voxel_num_x as f64 / 4.0;
    let (cx, cy) = (ig.voxel_num_x as f64 / 2.0, ig.voxel_num_y as f64 / 2.0);
    let rank = ig.dimension_labels().len();
    for (index, value) in phantom.as_array_mut().indexed_iter_mut() {
        let (y, x) = (index[rank - 2] as f64 + 0.5, index[rank - 1] as f64 + 0.5);
        if (x - cx).powi(2) + (y - cy).powi(2) <= radius * radius {
            *value = 1.0;
        }
    }

    let sinogram = op.direct_new(&phantom)?;
    let back = op.adjoint_new(&sinogram)?;
    info!("phantom {:?} -> sinogram {:?}", phantom.shape(), sinogram.shape());
    println!("phantom sum:        {:.4}", phantom.as_array().sum());
    println!("sinogram sum:       {:.4}", sinogram.as_array().sum());
    println!("backprojection max: {:.4}", back.as_array().fold(0.0f32, |m, &v| m.max(v)));
    Ok(())
}

fn handle_norm(matches: &ArgMatches) -> Result<()> {
    let Setup { context, ig, ag, config } = setup(matches)?;
    let iterations = config.power_iterations;
    let norm = if ig.channels > 1 {
        AstraProjectorMC::with_config(&ig, &ag, &context, config)?.norm()?
    } else {
        AstraProjectorSimple::with_config(&ig, &ag, &context, config)?.norm()?
    };
    println!("operator norm: {:.6} (at most {} power iterations)", norm, iterations);
    Ok(())
}
