use anyhow::Context;
use clap::Parser;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

mod compiler;
mod config;
mod tokenizer;

#[derive(Parser)]
#[command(name = "furai", about = "编译期 HTML 组件内联器", version = long_version())]
struct Cli {
    /// 入口 HTML 文件
    input: PathBuf,

    /// 输出文件（不能与入口文件相同）
    output: PathBuf,

    /// 配置文件（默认读取入口文件同目录下的 furai.toml）
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// slot 被填充后仍输出其默认内容
    #[arg(long)]
    keep_slot_default: bool,

    /// 缺少结束标签时不报错
    #[arg(long)]
    lenient: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // 参数错误以 1 退出；--help / --version 仍按 clap 默认处理
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            std::process::exit(1);
        }
        Err(e) => e.exit(),
    };

    if cli.input == cli.output {
        anyhow::bail!("入口文件不能与输出文件相同：{}", cli.input.display());
    }

    let (mut site_config, config_path) =
        config::FuraiConfig::discover(cli.config.as_deref(), &cli.input)?;
    if cli.keep_slot_default {
        site_config.compile.keep_slot_default = true;
    }
    if cli.lenient {
        site_config.compile.strict_termination = false;
    }

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&site_config.log.level)),
        )
        .init();

    if let Some(path) = &config_path {
        tracing::debug!("使用配置文件：{}", path.display());
    }

    let input = File::open(&cli.input)
        .with_context(|| format!("无法打开入口文件 {}", cli.input.display()))?;
    let output = File::create(&cli.output)
        .with_context(|| format!("无法创建输出文件 {}", cli.output.display()))?;
    let mut out = BufWriter::new(output);

    compiler::compile_reader(&cli.input, input, &mut out, &site_config.compile)?;

    Ok(())
}

const fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        "\ncommit:  ",
        env!("FURAI_GIT_COMMIT"),
        "\nbuild:   ",
        env!("FURAI_BUILD_TIME"),
        "\ntarget:  ",
        env!("FURAI_BUILD_TARGET"),
        "\nprofile: ",
        env!("FURAI_BUILD_PROFILE"),
    )
}
