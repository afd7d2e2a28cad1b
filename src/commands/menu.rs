//! Numbered interactive menu
//!
//! Hardening modules come first (numbered from 1), followed by report
//! generation, report comparison, and exit. Anything else re-prompts.
//! Ctrl-C or end of input at the prompt ends the session cleanly.

use anyhow::Result;
use colored::Colorize;
use hardenkit::{Label, Module, Session, SessionCommand, SessionResponse};
use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use super::{audit, compare, execute, open_session};
use crate::Context;
use crate::{interrupt, ui};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    /// Index into the hardening modules
    Module(usize),
    GenerateReport,
    CompareReports,
    Exit,
}

/// Map typed input to a menu entry
pub fn parse_choice(input: &str, modules: usize) -> Option<MenuChoice> {
    let n: usize = input.trim().parse().ok()?;
    match n {
        0 => None,
        n if n <= modules => Some(MenuChoice::Module(n - 1)),
        n if n == modules + 1 => Some(MenuChoice::GenerateReport),
        n if n == modules + 2 => Some(MenuChoice::CompareReports),
        n if n == modules + 3 => Some(MenuChoice::Exit),
        _ => None,
    }
}

// ============================================================================
// Input
// ============================================================================

/// Source of menu input
pub trait Prompt {
    fn ask(&mut self, prompt: &str) -> io::Result<String>;
    fn confirm(&mut self, prompt: &str) -> io::Result<bool>;
}

/// dialoguer prompts on an attended terminal
struct TermPrompt;

impl Prompt for TermPrompt {
    fn ask(&mut self, prompt: &str) -> io::Result<String> {
        dialoguer::Input::<String>::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
            .map_err(|dialoguer::Error::IO(e)| e)
    }

    fn confirm(&mut self, prompt: &str) -> io::Result<bool> {
        dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(|dialoguer::Error::IO(e)| e)
    }
}

/// How often a waiting line prompt checks for Ctrl-C
const INTERRUPT_POLL: Duration = Duration::from_millis(50);

/// Plain line reader for piped input
///
/// Lines are read on a background thread so a Ctrl-C can end the prompt
/// while the read itself is still blocked.
pub struct LinePrompt {
    lines: Receiver<io::Result<String>>,
    interrupted: &'static AtomicBool,
}

impl LinePrompt {
    pub fn new<R: BufRead + Send + 'static>(reader: R, interrupted: &'static AtomicBool) -> Self {
        let (tx, lines) = mpsc::channel();
        thread::spawn(move || {
            for line in reader.lines() {
                let failed = line.is_err();
                if tx.send(line).is_err() || failed {
                    break;
                }
            }
        });
        Self { lines, interrupted }
    }

    fn next_line(&self) -> io::Result<String> {
        loop {
            if self.interrupted.swap(false, Ordering::SeqCst) {
                return Err(io::ErrorKind::Interrupted.into());
            }
            match self.lines.recv_timeout(INTERRUPT_POLL) {
                Ok(line) => return line,
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(io::ErrorKind::UnexpectedEof.into());
                }
            }
        }
    }
}

impl Prompt for LinePrompt {
    fn ask(&mut self, prompt: &str) -> io::Result<String> {
        print!("{}: ", prompt);
        io::stdout().flush()?;
        self.next_line()
    }

    fn confirm(&mut self, prompt: &str) -> io::Result<bool> {
        let answer = self.ask(&format!("{} [y/N]", prompt))?;
        Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
    }
}

// ============================================================================
// Menu Loop
// ============================================================================

pub fn run(ctx: &Context) -> Result<()> {
    interrupt::install();
    let mut session = open_session(ctx)?;
    let mut prompt: Box<dyn Prompt> = if console::user_attended() {
        Box::new(TermPrompt)
    } else {
        Box::new(LinePrompt::new(io::BufReader::new(io::stdin()), interrupt::flag()))
    };

    if !ctx.quiet {
        ui::banner();
    }

    conclude(menu_loop(&mut session, prompt.as_mut()))
}

/// Ctrl-C and end of input at the prompt are normal ways to leave
fn conclude(ending: io::Result<()>) -> Result<()> {
    match ending {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::Interrupted => {
            println!();
            ui::info("Interrupted by user. Exiting.");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            println!();
            ui::info("End of input. Exiting.");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Show the menu and dispatch until the user picks Exit
pub fn menu_loop(session: &mut Session, prompt: &mut dyn Prompt) -> io::Result<()> {
    let modules: Vec<Module> = session.registry().hardening().cloned().collect();

    loop {
        print_menu(&modules);
        let input = prompt.ask("Enter your choice")?;
        let Some(choice) = parse_choice(&input, modules.len()) else {
            ui::error(&format!(
                "Invalid choice {:?}. Enter a number from 1 to {}.",
                input.trim(),
                modules.len() + 3
            ));
            continue;
        };

        match choice {
            MenuChoice::Module(idx) => run_module(session, prompt, &modules[idx])?,
            MenuChoice::GenerateReport => generate_report(session, prompt)?,
            MenuChoice::CompareReports => compare_reports(session, prompt)?,
            MenuChoice::Exit => {
                ui::info("Exiting.");
                return Ok(());
            }
        }
    }
}

fn print_menu(modules: &[Module]) {
    ui::header("Linux Hardening Tool");
    for (i, module) in modules.iter().enumerate() {
        println!("  {:>2}) {}", i + 1, module.display_name);
    }
    let n = modules.len();
    println!("  {:>2}) {}", n + 1, "Generate audit report".cyan());
    println!("  {:>2}) {}", n + 2, "Compare two reports".cyan());
    println!("  {:>2}) {}", n + 3, "Exit".dimmed());
    println!();
}

fn run_module(session: &mut Session, prompt: &mut dyn Prompt, module: &Module) -> io::Result<()> {
    let already_ran = session
        .engine()
        .log()
        .entries()
        .iter()
        .any(|r| r.module_id == module.id && r.is_success());
    if !module.is_idempotent() && already_ran {
        let again = prompt.confirm(&format!(
            "{} already ran in this session and is not idempotent. Run again?",
            module.display_name
        ))?;
        if !again {
            ui::dim("Skipped");
            return Ok(());
        }
    }

    ui::section(&format!("Running {}", module.display_name));
    let command = SessionCommand::RunModule {
        id: module.id.clone(),
        args: Vec::new(),
        timeout: None,
    };
    match execute(session, command) {
        SessionResponse::Ran(result) => ui::show_execution(&result, &module.display_name),
        SessionResponse::Rejected(e) => ui::error(&e.to_string()),
        other => log::warn!("Unexpected response: {:?}", other),
    }
    Ok(())
}

fn generate_report(session: &mut Session, prompt: &mut dyn Prompt) -> io::Result<()> {
    let input = prompt.ask("Scan type (pre/post)")?;
    let label: Label = match input.parse() {
        Ok(label) => label,
        Err(e) => {
            ui::error(&e.to_string());
            return Ok(());
        }
    };

    ui::section(&format!("Generating {} audit report", label));
    if let Err(e) = audit::generate(session, label) {
        ui::error(&format!("{:#}", e));
    }
    Ok(())
}

fn compare_reports(session: &mut Session, prompt: &mut dyn Prompt) -> io::Result<()> {
    let pre = prompt.ask("Path to pre-hardening report")?;
    let post = prompt.ask("Path to post-hardening report")?;

    match compare::compare(session, pre, post) {
        Ok(result) => ui::show_comparison(&result),
        Err(e) => {
            ui::error(&format!("{:#}", e));
            if let Some(err) = e.downcast_ref::<hardenkit::Error>() {
                ui::dim(err.advice());
            }
        }
    }
    Ok(())
}
