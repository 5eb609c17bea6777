use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use xshell::{Shell, cmd};

#[derive(Parser)]
#[command(name = "xtask", about = "FileBridge 开发任务自动化")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 构建守护进程和 CLI (release)
    Build,
    /// 运行守护进程 (开发模式)
    Dev {
        /// 日志级别 (trace, debug, info, warn, error)
        #[arg(short, long, default_value = "debug")]
        log_level: String,
        /// 使用临时配置目录，不影响本机配置
        #[arg(long)]
        scratch: bool,
    },
    /// 运行测试
    Test,
    /// 运行 clippy 和格式检查
    Lint,
    /// 打包发布 (tar.gz)
    Dist,
    /// 清理构建产物
    Clean,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let sh = Shell::new()?;

    // 确保在项目根目录执行
    let project_root = match std::env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir)
            .parent()
            .map(PathBuf::from)
            .unwrap_or_default(),
        Err(_) => std::env::current_dir()?,
    };
    sh.change_dir(&project_root);

    match cli.command {
        Commands::Build => build(&sh)?,
        Commands::Dev { log_level, scratch } => dev(&sh, &log_level, scratch)?,
        Commands::Test => test(&sh)?,
        Commands::Lint => lint(&sh)?,
        Commands::Dist => dist(&sh)?,
        Commands::Clean => clean(&sh)?,
    }

    Ok(())
}

fn build(sh: &Shell) -> Result<()> {
    println!("🔨 构建所有组件...");
    cmd!(sh, "cargo build --release -p filebridge-daemon -p filebridge-cli").run()?;
    println!("✅ 构建完成");
    Ok(())
}

fn dev(sh: &Shell, log_level: &str, scratch: bool) -> Result<()> {
    println!("🚀 启动开发模式守护进程...");

    let rust_log = format!("{level},filebridge_core={level}", level = log_level);
    let _env = sh.push_env("RUST_LOG", rust_log);

    if scratch {
        let dir = sh.current_dir().join("target").join("dev-config");
        sh.create_dir(&dir)?;
        println!("   配置目录: {}", dir.display());
        cmd!(sh, "cargo run -p filebridge-daemon -- --config-dir {dir}").run()?;
    } else {
        cmd!(sh, "cargo run -p filebridge-daemon").run()?;
    }
    Ok(())
}

fn test(sh: &Shell) -> Result<()> {
    println!("🧪 运行测试...");
    cmd!(sh, "cargo test --workspace").run()?;
    println!("✅ 测试完成");
    Ok(())
}

fn lint(sh: &Shell) -> Result<()> {
    println!("🔍 运行检查...");
    cmd!(sh, "cargo fmt --all -- --check").run()?;
    cmd!(sh, "cargo clippy --workspace --all-targets -- -D warnings").run()?;
    println!("✅ 检查通过");
    Ok(())
}

fn dist(sh: &Shell) -> Result<()> {
    println!("📦 打包发布...");

    build(sh)?;

    let version = env!("CARGO_PKG_VERSION");
    let dist_name = format!("filebridge-{}-{}", version, std::env::consts::ARCH);

    cmd!(sh, "mkdir -p dist/{dist_name}").run()?;
    cmd!(sh, "cp target/release/filebridge-daemon dist/{dist_name}/").run()?;
    cmd!(sh, "cp target/release/filebridge dist/{dist_name}/").run()?;

    sh.change_dir("dist");
    cmd!(sh, "tar -czvf {dist_name}.tar.gz {dist_name}").run()?;

    println!("✅ 打包完成: dist/{}.tar.gz", dist_name);
    Ok(())
}

fn clean(sh: &Shell) -> Result<()> {
    println!("🧹 清理构建产物...");
    cmd!(sh, "cargo clean").run()?;
    cmd!(sh, "rm -rf dist").run()?;
    println!("✅ 清理完成");
    Ok(())
}
