use anyhow::Result;

use super::Session;
use crate::Context;
use crate::cli::{Format, PlanArgs};
use crate::config::Settings;
use crate::engine::{self, differ};

pub fn run(ctx: &Context, settings: Settings, args: &PlanArgs) -> Result<()> {
    let mut session = Session::open(settings)?;
    let renderer = session.settings.renderer();
    let plans = engine::plan(
        &mut session.state,
        &session.desired,
        &renderer,
        &args.target.selected(),
    )?;

    match args.format {
        Format::Text => differ::display_plans(&plans, ctx.verbose > 0),
        Format::Json => println!("{}", serde_json::to_string_pretty(&plans.to_json()?)?),
    }
    Ok(())
}
