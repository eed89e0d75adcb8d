// Line-oriented session shell
//
// Reads commands from stdin (or a script), hands them to the SessionController
// and prints the status messages the session emits after each command.

use crate::models::ToolSettings;
use crate::models::schema::{FIELDS, WEATHER_PRESETS};
use crate::services::content;
use crate::services::server_config;
use crate::services::tracks;
use crate::state::SessionChange;
use crate::ui::commands::{self, SessionCommand};
use crate::ui::controller::SessionController;
use anyhow::{Context, Result, anyhow};
use camino::Utf8PathBuf;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::TryRecvError};

const PROMPT: &str = "acsm> ";

/// Whether the session continues after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Shell {
    controller: SessionController,
    events: broadcast::Receiver<SessionChange>,
}

impl Shell {
    pub fn new(controller: SessionController) -> Self {
        let events = controller.session().subscribe();
        Self { controller, events }
    }

    /// Build the session from persisted settings.
    ///
    /// The shell is already subscribed, so the status lines startup posts (content
    /// scan, cfg load summary) are printed when the session starts running.
    pub fn startup(&mut self, settings: ToolSettings) -> Result<()> {
        self.controller.startup(settings)
    }

    /// Read commands from stdin until `quit` or end of input.
    ///
    /// Command failures are printed and the session continues.
    pub async fn run_interactive(&mut self) -> Result<()> {
        self.print_events();
        println!("acsm {} - type `help` for commands", crate::VERSION);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            prompt();
            let Some(line) = lines.next_line().await.context("Failed to read from stdin")? else {
                break;
            };

            match self.execute_line(&line).await {
                Ok(Flow::Quit) => break,
                Ok(Flow::Continue) => {}
                Err(e) => eprintln!("error: {:#}", e),
            }
            self.print_events();
        }
        Ok(())
    }

    /// Run `lines` in order, stopping at the first failure.
    pub async fn run_script(&mut self, lines: &[String]) -> Result<()> {
        self.print_events();
        for line in lines {
            let flow = self.execute_line(line).await;
            self.print_events();
            if flow.with_context(|| format!("Command failed: {}", line))? == Flow::Quit {
                break;
            }
        }
        Ok(())
    }

    /// Parse and run one input line.
    pub async fn execute_line(&mut self, line: &str) -> Result<Flow> {
        let command = match commands::parse_line(line) {
            Ok(Some(command)) => command,
            Ok(None) => return Ok(Flow::Continue),
            Err(e) if e.is_informational() => {
                println!("{}", e);
                return Ok(Flow::Continue);
            }
            Err(e) => return Err(e.into()),
        };

        tracing::debug!("Command: {:?}", command);
        self.execute(command).await
    }

    async fn execute(&mut self, command: SessionCommand) -> Result<Flow> {
        let controller = &mut self.controller;

        match command {
            SessionCommand::Show { field: Some(name) } => {
                println!("{} = {}", name, controller.field_display(&name)?);
            }
            SessionCommand::Show { field: None } => self.show_all(),
            SessionCommand::Fields => {
                for def in FIELDS {
                    println!(
                        "{:<24} {:<24} [{}] {} ({:?})",
                        def.name,
                        server_config::file_name(def.file),
                        def.section,
                        def.key,
                        def.kind
                    );
                }
            }
            SessionCommand::Set { field, value } => {
                controller.set_field(&field, &value.join(" "))?;
            }
            SessionCommand::Paths { game: None, server: None } => {
                let (game, server) = controller.session().read(|state| (state.game_path.clone(), state.server_path.clone()));
                println!("game:   {}", game.map(|p| p.to_string()).unwrap_or_else(|| "(not set)".into()));
                println!("server: {}", server.map(|p| p.to_string()).unwrap_or_else(|| "(not set)".into()));
            }
            SessionCommand::Paths { game, server } => {
                controller.set_paths(game.map(Utf8PathBuf::from), server.map(Utf8PathBuf::from))?;
            }
            SessionCommand::Refresh => controller.refresh(),
            SessionCommand::Cars { filter } => {
                let cars = controller.session().read(|state| state.available_cars.clone());
                let shown = content::filter_cars(&cars, filter.as_deref().unwrap_or(""));
                for car in &shown {
                    println!("{}", car);
                }
                println!("{} of {} cars", shown.len(), cars.len());
            }
            SessionCommand::Grid => self.show_grid(),
            SessionCommand::AddCar { model, quantity } => controller.add_car(&model, quantity)?,
            SessionCommand::RemoveCar { index } => {
                let index = index
                    .checked_sub(1)
                    .ok_or_else(|| anyhow!("Grid rows are numbered from 1"))?;
                controller.remove_car(index)?;
            }
            SessionCommand::ClearGrid => controller.clear_grid(),
            SessionCommand::Tracks => self.show_tracks(),
            SessionCommand::Track { name, layout } => controller.select_track(&name, layout.as_deref())?,
            SessionCommand::Layout { name } => controller.select_layout(&name)?,
            SessionCommand::Weather => {
                let current = controller
                    .session()
                    .read(|state| state.model.text("weather_type").unwrap_or_default().to_string());
                for preset in WEATHER_PRESETS {
                    let marker = if *preset == current { "*" } else { " " };
                    println!("{} {}", marker, preset);
                }
            }
            SessionCommand::Save { keep_max_clients } => {
                let summary = controller.save_all(!keep_max_clients)?;
                for file in &summary.files {
                    println!("wrote {}", file);
                }
            }
            SessionCommand::EntryList => {
                controller.generate_entry_list()?;
            }
            SessionCommand::Install { clean } => {
                controller.install_server(clean).await?;
            }
            SessionCommand::Start => {
                controller.start_server().await?;
            }
            SessionCommand::Stop => {
                controller.stop_server().await?;
            }
            SessionCommand::Kill => {
                controller.kill_server().await;
            }
            SessionCommand::Restart => {
                controller.restart_server().await?;
            }
            SessionCommand::Status => {
                println!("Server: {}", controller.server_status().label());
            }
            SessionCommand::Open => controller.open_folder()?,
            SessionCommand::Quit => return Ok(Flow::Quit),
        }

        Ok(Flow::Continue)
    }

    fn show_all(&self) {
        self.controller.session().read(|state| {
            let mut section = "";
            for (def, value) in state.model.fields() {
                if def.section != section {
                    section = def.section;
                    println!("[{}]", section);
                }
                println!("  {:<24} {}", def.name, def.display(value));
            }
        });
    }

    fn show_grid(&self) {
        let (lines, total, max_clients) = self.controller.session().read(|state| {
            (state.grid_lines(), state.model.total_slots(), state.model.max_clients())
        });

        if lines.is_empty() {
            println!("Grid is empty");
            return;
        }
        for (row, line) in lines.iter().enumerate() {
            println!("{:>3}. {}", row + 1, line);
        }
        println!("Total slots: {} (max clients {})", total, max_clients);
    }

    fn show_tracks(&self) {
        self.controller.session().read(|state| {
            for track in &state.available_tracks {
                let marker = if *track == state.model.track { "*" } else { " " };
                println!("{} {}", marker, track);
            }
            if state.model.track.is_empty() {
                return;
            }

            println!("Layouts of {}:", state.model.track);
            for (layout, pit_boxes) in &state.track_layouts {
                let marker = if *layout == state.model.layout { "*" } else { " " };
                let name = if layout.is_empty() { "(default)" } else { layout.as_str() };
                println!("{} {:<24} pit boxes {}", marker, name, tracks::pit_boxes_label(*pit_boxes));
            }
        });
    }

    /// Print pending session events without waiting.
    fn print_events(&mut self) {
        for line in self.pending_lines() {
            println!("{}", line);
        }
    }

    /// Drain pending session events into the lines shown to the operator.
    fn pending_lines(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(SessionChange::StatusMessage { message }) => lines.push(message),
                Ok(SessionChange::ServerStatusChanged { status }) => lines.push(format!("Server: {}", status.label())),
                Ok(SessionChange::FieldsChanged { fields }) => {
                    let over_capacity = fields.contains(&"max_clients")
                        && self.controller.session().read(|state| state.model.check_capacity().is_err());
                    if over_capacity {
                        lines.push("warning: the grid has more slots than max_clients".to_string());
                    }
                }
                Ok(other) => tracing::debug!("Session change: {:?}", other),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::debug!("Skipped {} session events", skipped);
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        lines
    }
}

fn prompt() {
    print!("{}", PROMPT);
    // A failed flush only delays the prompt
    let _ = std::io::stdout().flush();
}
