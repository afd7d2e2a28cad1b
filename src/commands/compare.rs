use anyhow::{Context as _, Result, bail};
use hardenkit::{ComparisonResult, Label, Session, SessionCommand, SessionResponse};

use super::{execute, open_session};
use crate::Context;
use crate::cli::CompareArgs;
use crate::ui;

pub fn run(ctx: &Context, args: CompareArgs) -> Result<()> {
    let mut session = open_session(ctx)?;

    let (pre, post) = if args.latest {
        let store = session.store();
        let pre = store.latest(Label::Pre).context("No stored pre report")?;
        let post = store.latest(Label::Post).context("No stored post report")?;
        (
            pre.path.display().to_string(),
            post.path.display().to_string(),
        )
    } else {
        match (args.pre, args.post) {
            (Some(pre), Some(post)) => (pre, post),
            _ => bail!("Both a pre and a post report are required (or --latest)"),
        }
    };

    let result = compare(&mut session, pre, post)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        ui::show_comparison(&result);
    }

    if args.save {
        let path = session.store().save_comparison(&result)?;
        if !args.json {
            ui::success(&format!("Comparison saved to {}", path.display()));
        }
    }
    Ok(())
}

pub fn compare(session: &mut Session, pre: String, post: String) -> Result<ComparisonResult> {
    match execute(session, SessionCommand::CompareReports { pre, post }) {
        SessionResponse::Compared(result) => Ok(result),
        SessionResponse::Rejected(e) => Err(e.into()),
        other => bail!("Unexpected response: {:?}", other),
    }
}
