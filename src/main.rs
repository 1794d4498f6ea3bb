use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "manga-typeset",
    version,
    about = "Typeset translated text into detected manga speech bubbles"
)]
struct Cli {
    /// Page image to draw on (usually the inpainted page)
    #[arg(short = 'd', long = "data")]
    data: Option<String>,

    /// JSON array of detection boxes: {"bbox": [x0, y0, x1, y1], "text": "..."}
    #[arg(short = 'R', long = "regions")]
    regions: String,

    /// Output image path (default: output/<name>_translated.<ext>)
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Override the grouping threshold in pixels
    #[arg(short = 'y', long = "y-threshold")]
    y_threshold: Option<i32>,

    /// Print the grouped regions as JSON and exit
    #[arg(long = "show-groups")]
    show_groups: bool,

    /// Also write a PNG showing detection and group boxes
    #[arg(long = "debug-groups")]
    debug_groups: bool,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    manga_typeset::logging::init(cli.verbose)?;

    let output = manga_typeset::run(manga_typeset::Config {
        data: cli.data,
        regions: cli.regions,
        output: cli.output,
        settings_path: cli.read_settings,
        y_threshold: cli.y_threshold,
        show_groups: cli.show_groups,
        debug_groups: cli.debug_groups,
    })?;

    println!("{}", output);
    Ok(())
}
