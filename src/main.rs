mod app;
mod config;
mod driver;
mod globe;
mod input;
mod raster;
mod render;

use anyhow::Result;
use std::env;
use std::process;

#[derive(Clone, Debug, Default)]
pub(crate) struct CliArgs {
    pub(crate) fps: Option<u32>,
    pub(crate) seed: Option<u64>,
    pub(crate) size: Option<(u16, u16)>,
    pub(crate) shade: bool,
    pub(crate) no_color: bool,
    pub(crate) no_glitch: bool,
    pub(crate) dump: Option<u32>,
    pub(crate) help: bool,
}

const USAGE: &str = "\
glitchglobe - a glitchy rotating ascii globe for your terminal

USAGE:
    glitchglobe [OPTIONS]

OPTIONS:
    --fps <n>        cap the frame rate (10-240, default 30)
    --seed <n>       seed the glitch rng
    --size <WxH>     fix the globe grid, e.g. --size 80x40
    --shade          start in the braille shade variant
    --no-color       plain green instead of truecolor
    --no-glitch      start with the glitch effect off
    --dump [n]       render n frames headless, print the last, exit
    --help           show this help

KEYS:
    q / esc   quit       v   glyph / shade
    g   glitch on/off    h   hud on/off
    r   reseed           ?   help overlay
";

/// Lenient by design: a malformed value reads as absent and the setting
/// keeps its default, only unknown options are fatal.
fn parse_args(args: &[String]) -> Result<CliArgs, String> {
    let mut out = CliArgs::default();
    let mut it = args.iter().peekable();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--fps" => out.fps = it.next().and_then(|v| v.parse().ok()),
            "--seed" => out.seed = it.next().and_then(|v| v.parse().ok()),
            "--size" => out.size = it.next().and_then(|v| parse_size(v)),
            "--shade" => out.shade = true,
            "--no-color" => out.no_color = true,
            "--no-glitch" => out.no_glitch = true,
            "--dump" => {
                let n = match it.peek() {
                    Some(v) if !v.starts_with("--") => it.next().and_then(|v| v.parse().ok()),
                    _ => None,
                };
                out.dump = Some(n.unwrap_or(1));
            }
            "--help" | "-h" => out.help = true,
            other => return Err(format!("unknown option: {other}")),
        }
    }
    Ok(out)
}

fn parse_size(v: &str) -> Option<(u16, u16)> {
    let (w, h) = v.split_once('x')?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

fn main() -> Result<()> {
    let raw: Vec<String> = env::args().skip(1).collect();
    let args = match parse_args(&raw) {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{msg}\n\n{USAGE}");
            process::exit(2);
        }
    };
    if args.help {
        print!("{USAGE}");
        return Ok(());
    }
    if let Some(frames) = args.dump {
        app::dump(&args, frames)
    } else {
        app::run(&args)
    }
}
