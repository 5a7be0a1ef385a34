use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use chrono::Utc;
use hub_core::{update, AppState, Msg};
use hub_engine::{
    Backends, EngineHandle, IdentityProvider, RecoveryCache, ReqwestHubClient,
    StaticTokenProvider, ACCESS_TOKEN_ENV,
};
use hub_logging::{hub_info, hub_warn};

use super::command::{self, Command, HELP};
use super::effects::{event_to_msg, EffectRunner};
use super::logging;
use super::render::render;
use crate::cli::Cli;
use crate::config::HubConfig;

const INPUT_POLL: Duration = Duration::from_millis(50);
const SETTLE_POLL: Duration = Duration::from_millis(100);
/// Upper bound for the final flush when input ends.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let config = HubConfig::load(cli.config.as_deref()).context("loading configuration")?;
    logging::initialize(config.log_destination, cli.verbose);
    hub_info!("Starting hub console against {}", config.api_base_url);

    let identity = Arc::new(StaticTokenProvider::from_env_or(config.access_token.clone()));
    if !identity.is_authenticated() {
        bail!("not signed in: set {ACCESS_TOKEN_ENV} or access_token in the config file");
    }
    let client = Arc::new(
        ReqwestHubClient::new(config.api_settings(), identity)
            .context("building the HTTP client")?,
    );
    let backends = Backends {
        drafts: client.clone(),
        jobs: client,
        cache: RecoveryCache::new(config.recovery_dir.clone()),
    };
    let engine = EngineHandle::new(backends).context("starting the engine")?;

    let mut app = ConsoleApp::new(EffectRunner::new(engine), AppState::with_timings(config.timings()));
    let mount = Msg::Mount {
        draft_id: cli.draft.clone(),
        owner: cli.owner.clone(),
        kind: cli.kind,
    };
    app.dispatch(mount.clone());

    let input = spawn_input_reader(&cli)?;
    app.run_until_end_of_input(&input, &mount);
    app.finish();
    Ok(())
}

/// Reads lines on a separate thread so the main loop can keep serving
/// engine events while the user types.
fn spawn_input_reader(cli: &Cli) -> anyhow::Result<mpsc::Receiver<String>> {
    let reader: Box<dyn BufRead + Send> = match &cli.script {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("opening script {path:?}"))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };
    let (line_tx, line_rx) = mpsc::channel();
    thread::Builder::new()
        .name("hub-input".to_string())
        .spawn(move || {
            for line in reader.lines() {
                match line {
                    Ok(line) => {
                        if line_tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        hub_warn!("Input stopped: {}", err);
                        break;
                    }
                }
            }
        })
        .context("starting the input thread")?;
    Ok(line_rx)
}

struct ConsoleApp {
    runner: EffectRunner,
    state: AppState,
}

impl ConsoleApp {
    fn new(runner: EffectRunner, state: AppState) -> Self {
        Self { runner, state }
    }

    fn dispatch(&mut self, msg: Msg) {
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update(state, msg);
        self.state = state;
        self.runner.enqueue(effects);
        hub_logging::set_draft_context(self.state.draft().map(|draft| draft.id.as_str()));
        if self.state.consume_dirty() {
            print!("{}", render(&self.state.view()));
        }
    }

    fn pump_engine(&mut self) {
        while let Some(event) = self.runner.engine().try_recv() {
            self.dispatch(event_to_msg(event, Utc::now()));
        }
    }

    fn run_until_end_of_input(&mut self, input: &mpsc::Receiver<String>, mount: &Msg) {
        loop {
            self.pump_engine();
            match input.recv_timeout(INPUT_POLL) {
                Ok(line) => {
                    if !self.handle_line(&line, mount) {
                        return;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }
    }

    /// Returns false when the user asked to quit.
    fn handle_line(&mut self, line: &str, mount: &Msg) -> bool {
        let command = match command::parse(line) {
            Ok(Some(command)) => command,
            Ok(None) => return true,
            Err(err) => {
                eprintln!("{err}");
                return true;
            }
        };
        match command {
            Command::Quit => return false,
            Command::Help => println!("{HELP}"),
            Command::Show => print!("{}", render(&self.state.view())),
            Command::Wait => self.wait_until_settled(None),
            Command::Reload => self.dispatch(mount.clone()),
            other => {
                let current_step = self.state.draft().map(|draft| draft.current_step);
                if let Some(msg) = other.to_msg(current_step, Utc::now()) {
                    self.dispatch(msg);
                }
            }
        }
        true
    }

    /// Serves engine events until nothing is outstanding or `limit` passes.
    fn wait_until_settled(&mut self, limit: Option<Duration>) {
        let started = Instant::now();
        while !self.state.is_settled() {
            if limit.is_some_and(|limit| started.elapsed() >= limit) {
                hub_warn!("Gave up waiting for outstanding work after {:?}", started.elapsed());
                return;
            }
            if let Some(event) = self.runner.engine().recv_timeout(SETTLE_POLL) {
                self.dispatch(event_to_msg(event, Utc::now()));
                self.pump_engine();
            }
        }
    }

    /// Saves what is pending, leaves the editor and stops the engine.
    fn finish(mut self) {
        if self.state.is_mounted() {
            self.dispatch(Msg::FlushRequested);
            self.wait_until_settled(Some(SHUTDOWN_GRACE));
            self.dispatch(Msg::Unmounted);
        }
        hub_info!("Shutting down");
        self.runner.into_engine().shutdown();
    }
}
