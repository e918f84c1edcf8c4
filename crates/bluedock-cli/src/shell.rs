//! Interactive line-oriented front end over one [`Session`].

use std::path::PathBuf;

use bluedock_core::{AppError, SearchMode};
use bluedock_services::Direction;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::render::{render_map, render_outcome, write_map};
use crate::session::{SearchOutcome, Session};

/// A picked point closer than this to the current location is ignored.
pub const MIN_MOVE_MILES: f64 = 0.05;

pub const HELP: &str = "\
Commands:
  pickup <address>      find bikes near an address
  dropoff <address>     find docks near an address
  here <lat> <lon>      search at coordinates instead of an address
  mode pickup|dropoff   switch the active search
  radius <miles>        0.1, 0.25, 0.5, 0.75, 1.0, 1.5 or 2.0
  direction <dir>       all, north, northeast, ... or N, NE, ...
  refresh               reload station availability and search again
  save [name]           save the active search as a favorite
  load <name>           restore a favorite and search
  favorites             list favorites
  delete <name>         remove a favorite
  map [file]            write the last result as an HTML map
  help                  show this help
  quit                  leave the shell";

#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    Search { mode: SearchMode, address: String },
    Here { lat: f64, lon: f64 },
    Mode(SearchMode),
    Radius(f64),
    Direction(Direction),
    Refresh,
    Save(Option<String>),
    Load(String),
    Favorites,
    Delete(String),
    Map(Option<PathBuf>),
    Help,
    Quit,
    Empty,
}

fn required(rest: &str, what: &str) -> Result<String, String> {
    if rest.is_empty() {
        Err(format!("missing {}", what))
    } else {
        Ok(rest.to_string())
    }
}

pub fn parse_command(line: &str) -> Result<ShellCommand, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_lowercase().as_str() {
        "" => ShellCommand::Empty,
        "pickup" => ShellCommand::Search {
            mode: SearchMode::Pickup,
            address: required(rest, "address")?,
        },
        "dropoff" => ShellCommand::Search {
            mode: SearchMode::Dropoff,
            address: required(rest, "address")?,
        },
        "here" | "at" => {
            let mut parts = rest
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|p| !p.is_empty());
            let mut number = |name: &str| -> Result<f64, String> {
                parts
                    .next()
                    .ok_or_else(|| format!("missing {}", name))?
                    .parse::<f64>()
                    .map_err(|_| format!("invalid {}", name))
            };
            let lat = number("latitude")?;
            let lon = number("longitude")?;
            ShellCommand::Here { lat, lon }
        }
        "mode" => ShellCommand::Mode(required(rest, "mode")?.parse()?),
        "radius" => ShellCommand::Radius(
            required(rest, "radius")?
                .parse()
                .map_err(|_| format!("invalid radius: {}", rest))?,
        ),
        "direction" | "dir" => ShellCommand::Direction(required(rest, "direction")?.parse()?),
        "refresh" => ShellCommand::Refresh,
        "save" => ShellCommand::Save(Some(rest.to_string()).filter(|s| !s.is_empty())),
        "load" => ShellCommand::Load(required(rest, "favorite name")?),
        "favorites" | "favs" => ShellCommand::Favorites,
        "delete" => ShellCommand::Delete(required(rest, "favorite name")?),
        "map" => ShellCommand::Map(Some(rest).filter(|r| !r.is_empty()).map(PathBuf::from)),
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" | "q" => ShellCommand::Quit,
        other => return Err(format!("unknown command: {} (try help)", other)),
    };
    Ok(command)
}

fn report(error: &AppError) {
    tracing::debug!("{}", error);
    println!("{}", error.user_message());
    println!("  ({})", error);
}

pub struct Shell<'a> {
    session: &'a mut Session,
    mode: SearchMode,
    last: Option<SearchOutcome>,
    map_output: PathBuf,
}

impl<'a> Shell<'a> {
    pub fn new(session: &'a mut Session, mode: SearchMode) -> Self {
        let map_output = session.config().storage.map_output.clone();
        Self {
            session,
            mode,
            last: None,
            map_output,
        }
    }

    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    /// Read commands from stdin until `quit` or end of input.
    pub async fn run(&mut self) -> Result<(), AppError> {
        println!("{}", HELP);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            println!();
            println!("[{} | {}]", self.mode.title(), self.describe_params());
            let Some(line) = lines.next_line().await? else {
                break;
            };

            match parse_command(&line) {
                Ok(ShellCommand::Quit) => break,
                Ok(command) => {
                    if let Err(e) = self.execute(command).await {
                        report(&e);
                    }
                }
                Err(message) => println!("{}", message),
            }
        }
        Ok(())
    }

    fn describe_params(&self) -> String {
        let params = self.session.params(self.mode);
        let address = if params.address.is_empty() {
            "no address"
        } else {
            params.address.as_str()
        };
        format!("{} | {} mi | {}", address, params.radius, params.direction)
    }

    async fn search(&mut self) -> Result<(), AppError> {
        if self.session.params(self.mode).address.is_empty() {
            println!("Enter an address to find stations");
            return Ok(());
        }
        let outcome = self.session.search(self.mode, false).await?;
        println!("{}", render_outcome(&outcome));
        self.last = Some(outcome);
        Ok(())
    }

    pub async fn execute(&mut self, command: ShellCommand) -> Result<(), AppError> {
        match command {
            ShellCommand::Empty | ShellCommand::Quit => {}
            ShellCommand::Help => println!("{}", HELP),
            ShellCommand::Search { mode, address } => {
                self.mode = mode;
                self.session.set_address(mode, &address);
                self.search().await?;
            }
            ShellCommand::Here { lat, lon } => {
                if let Some(moved) = self.session.distance_from_current(self.mode, lat, lon) {
                    if moved <= MIN_MOVE_MILES {
                        println!("That is already the current search location");
                        return Ok(());
                    }
                    println!("Searching here ({:.1} mi away)", moved);
                }
                self.session.place_at(self.mode, lat, lon)?;
                self.search().await?;
            }
            ShellCommand::Mode(mode) => {
                self.mode = mode;
                self.search().await?;
            }
            ShellCommand::Radius(radius) => {
                self.session.set_radius(self.mode, radius);
                self.search().await?;
            }
            ShellCommand::Direction(direction) => {
                self.session.set_direction(self.mode, direction);
                self.search().await?;
            }
            ShellCommand::Refresh => {
                let count = self.session.refresh_stations().await?;
                println!("Loaded {} stations", count);
                self.search().await?;
            }
            ShellCommand::Save(name) => {
                let name = self.session.save_favorite(self.mode, name)?;
                println!("Saved favorite: {}", name);
            }
            ShellCommand::Load(name) => {
                self.mode = self.session.load_favorite(&name)?;
                self.search().await?;
            }
            ShellCommand::Favorites => {
                let favorites = &self.session.preferences().favorites;
                if favorites.is_empty() {
                    println!("No favorites saved");
                }
                for (name, favorite) in favorites {
                    println!(
                        "{}: {} ({}, {} mi, {})",
                        name, favorite.address, favorite.search_type, favorite.radius, favorite.direction
                    );
                }
            }
            ShellCommand::Delete(name) => {
                self.session.delete_favorite(&name)?;
                println!("Deleted favorite: {}", name);
            }
            ShellCommand::Map(path) => {
                let Some(outcome) = &self.last else {
                    println!("Run a search first");
                    return Ok(());
                };
                let path = path.unwrap_or_else(|| self.map_output.clone());
                write_map(&path, &render_map(outcome)?)?;
                println!("Map written to {}", path.display());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_searches() {
        assert_eq!(
            parse_command("pickup  Ruggles St and Huntington Ave ").unwrap(),
            ShellCommand::Search {
                mode: SearchMode::Pickup,
                address: "Ruggles St and Huntington Ave".into()
            }
        );
        assert!(parse_command("dropoff").is_err());
    }

    #[test]
    fn parses_coordinates() {
        assert_eq!(
            parse_command("here 42.35, -71.06").unwrap(),
            ShellCommand::Here {
                lat: 42.35,
                lon: -71.06
            }
        );
        assert!(parse_command("here 42.35").is_err());
        assert!(parse_command("here north south").is_err());
    }

    #[test]
    fn parses_settings() {
        assert_eq!(parse_command("radius 0.25").unwrap(), ShellCommand::Radius(0.25));
        assert!(parse_command("radius far").is_err());
        assert_eq!(
            parse_command("direction NE").unwrap(),
            ShellCommand::Direction(Direction::Northeast)
        );
        assert_eq!(
            parse_command("mode docks").unwrap(),
            ShellCommand::Mode(SearchMode::Dropoff)
        );
    }

    #[test]
    fn parses_favorites_and_misc() {
        assert_eq!(parse_command("save").unwrap(), ShellCommand::Save(None));
        assert_eq!(
            parse_command("save home base").unwrap(),
            ShellCommand::Save(Some("home base".into()))
        );
        assert_eq!(parse_command("load work").unwrap(), ShellCommand::Load("work".into()));
        assert_eq!(parse_command("map").unwrap(), ShellCommand::Map(None));
        assert_eq!(
            parse_command("map out.html").unwrap(),
            ShellCommand::Map(Some(PathBuf::from("out.html")))
        );
        assert_eq!(parse_command("   ").unwrap(), ShellCommand::Empty);
        assert_eq!(parse_command("EXIT").unwrap(), ShellCommand::Quit);
        assert!(parse_command("fly me to the moon").is_err());
    }
}
