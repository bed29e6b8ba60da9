use clap::Subcommand;

use super::{print_json, App, CliResult};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Hour-by-hour activity of a week
    Heatmap {
        /// Weeks back from the current one (0 = this week)
        #[arg(long, default_value_t = 0)]
        weeks_back: u32,
        /// Print as JSON instead of a chart
        #[arg(long)]
        json: bool,
    },
    /// Consecutive active days
    Streak,
    /// Totals, growth and most productive times
    Summary,
}

pub fn run(action: StatsAction) -> CliResult {
    let app = App::open()?;
    let timer = app.focus_timer()?;

    match action {
        StatsAction::Heatmap { weeks_back, json } => {
            let offset = -i32::try_from(weeks_back)?;
            let heatmap = timer.weekly_heatmap(offset);
            if json {
                print_json(&heatmap)?;
            } else {
                print!("{}", heatmap.render_ascii());
            }
        }
        StatsAction::Streak => print_json(&timer.streak())?,
        StatsAction::Summary => {
            let tasks = app.tasks.list()?;
            print_json(&timer.summary(&tasks))?;
        }
    }
    Ok(())
}
