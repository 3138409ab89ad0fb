//! Terminal front end for one redemption session.

use std::{
    io::Write,
    path::Path,
    sync::Arc,
    time::{Duration, Instant},
};

use engine::{
    AddressLookup, FlowError, PlayAttempt, RegistrationForm, RewardBackend, Session,
    SessionEvent, SessionOptions, SessionWarning, ShareOutcome, SpinPlan, Stage, Voucher,
    deeplink, voucher::NoShareSurface,
};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::{
    error::{AppError, Result},
    settings::Settings,
};

const FRAME: Duration = Duration::from_millis(250);
const SHARE_LOG_GRACE: Duration = Duration::from_secs(2);

type Input = Lines<BufReader<Stdin>>;

async fn prompt(input: &mut Input, label: &str) -> Result<String> {
    print!("{label}: ");
    std::io::stdout().flush()?;
    let line = input.next_line().await?.ok_or(AppError::InputClosed)?;
    Ok(line.trim().to_string())
}

async fn read_form(input: &mut Input) -> Result<RegistrationForm> {
    let first_name = prompt(input, "First name").await?;
    let last_name = prompt(input, "Last name").await?;
    let mut country_code = prompt(input, "Country code [+973]").await?;
    if country_code.is_empty() {
        country_code = "+973".to_string();
    }
    let phone = prompt(input, "Phone").await?;
    let email = prompt(input, "Email (optional)").await?;

    Ok(RegistrationForm {
        first_name,
        last_name,
        country_code,
        phone,
        email: (!email.is_empty()).then_some(email),
    })
}

/// Print the recovery hint for terminal errors and hand the error back.
fn terminal(err: FlowError) -> AppError {
    if let FlowError::Terminal(_) = err {
        println!("\n{err}\nScan a new code to start again.");
    }
    err.into()
}

fn spawn_event_log(session: &mut Session<impl RewardBackend, impl AddressLookup>) {
    let Some(mut events) = session.events() else {
        return;
    };
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::StageChanged { from, to } => {
                    tracing::debug!("stage {from} -> {to}");
                }
                SessionEvent::Revealed(voucher) => {
                    tracing::debug!("revealed {}", voucher.code);
                }
                SessionEvent::BestEffortFailed { operation, message } => {
                    tracing::debug!("background {operation} failed: {message}");
                }
            }
        }
    });
}

/// The spin always runs for the fixed wheel duration; only the review gate is
/// configurable.
fn session_options(settings: &Settings) -> SessionOptions {
    SessionOptions {
        skip_review: settings.skip_review,
        ..SessionOptions::default()
    }
}

pub async fn run<B, L>(settings: &Settings, link: &str, backend: Arc<B>, lookup: Arc<L>) -> Result<()>
where
    B: RewardBackend,
    L: AddressLookup,
{
    let link = deeplink::parse(link)?;
    tracing::info!("opened {}", link.stripped);

    let mut session = Session::new(Arc::clone(&backend), lookup, session_options(settings));
    spawn_event_log(&mut session);
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    let branch = session.validate(link.token).await.map_err(terminal)?;
    println!("Welcome to {}!", branch.branch_name);

    let stage = loop {
        let form = read_form(&mut input).await?;
        match session.register(form).await {
            Ok(stage) => break stage,
            Err(FlowError::InvalidForm(err)) => println!("{err}"),
            Err(err) => return Err(terminal(err)),
        }
    };

    if stage == Stage::ReviewGating {
        let url = session.open_review()?;
        println!("\nPlease rate your visit: {url}");
        prompt(&mut input, "Press enter once you are done").await?;
        session.confirm_review().await.map_err(terminal)?;
    }

    if let Some(warning @ SessionWarning::NoActivePrizes) = session.warning() {
        println!("{warning} Please ask the staff.");
        return Ok(());
    }

    if let Some(wheel) = session.wheel() {
        println!();
        for arc in wheel.arcs() {
            println!("{:>6.1}..{:>6.1}  {}", arc.start, arc.end, arc.prize.name);
        }
    }
    prompt(&mut input, "\nPress enter to spin").await?;

    let plan = match session.play().await.map_err(terminal)? {
        PlayAttempt::Started(plan) => plan,
        PlayAttempt::Ignored => return Ok(()),
    };

    let voucher = spin(&mut session, plan).await?;
    present(&voucher, &settings.download_dir, &backend, &mut input).await
}

/// Animate the wheel until it stops. Ctrl-C abandons the spin.
async fn spin<B: RewardBackend, L: AddressLookup>(
    session: &mut Session<B, L>,
    plan: SpinPlan,
) -> Result<Voucher> {
    let started = Instant::now();
    let mut frames = tokio::time::interval(FRAME);

    let result = {
        let reveal = session.reveal();
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(reveal, ctrl_c);
        loop {
            tokio::select! {
                result = &mut reveal => break Some(result),
                _ = frames.tick() => {
                    print!("\r{:>8.1}", plan.angle_at(started.elapsed()).rem_euclid(360.0));
                    std::io::stdout().flush()?;
                }
                _ = &mut ctrl_c => break None,
            }
        }
    };
    println!();

    match result {
        Some(result) => Ok(result.map_err(terminal)?),
        None => {
            session.abandon();
            println!("Spin abandoned.");
            Err(FlowError::SpinAbandoned.into())
        }
    }
}

async fn present<B: RewardBackend>(
    voucher: &Voucher,
    download_dir: &Path,
    backend: &Arc<B>,
    input: &mut Input,
) -> Result<()> {
    println!("\nYou won: {}", voucher.prize_name);
    println!("Voucher {} valid until {}", voucher.code, voucher.expires_at.format("%Y-%m-%d"));

    loop {
        match voucher.download(download_dir).await {
            Ok(path) => {
                println!("Saved to {}", path.display());
                break;
            }
            Err(err) => {
                println!("{err}");
                let retry = prompt(input, "Retry? [y/N]").await?;
                if !retry.eq_ignore_ascii_case("y") {
                    break;
                }
            }
        }
    }

    let receipt = voucher.share(None::<&NoShareSurface>, backend).await?;
    match &receipt.outcome {
        ShareOutcome::Shared => println!("Shared."),
        ShareOutcome::Link(url) => println!("Share it: {url}"),
    }
    // The process exits right after this; give the share log a moment.
    receipt.settle(SHARE_LOG_GRACE).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use engine::wheel::SPIN_DURATION;

    use super::*;

    #[test]
    fn sessions_spin_for_the_fixed_duration() {
        let settings = Settings {
            skip_review: true,
            ..Settings::default()
        };
        let options = session_options(&settings);
        assert!(options.skip_review);
        assert_eq!(options.spin_duration, SPIN_DURATION);
    }
}
