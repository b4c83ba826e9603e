use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use trip_planner::config::PlannerConfig;
use trip_planner::planner::questions::question_for;
use trip_planner::planner::{PlanRequest, PlanResponse, TripPlanner, UserResponses};

type Input = Lines<BufReader<Stdin>>;

/// Install the global subscriber. Logs go to a daily file when a directory
/// is configured so they stay out of the conversation.
fn init_tracing(config: &PlannerConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "trip-planner.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = PlannerConfig::from_env().context("invalid configuration")?;
    let _log_guard = init_tracing(&config);

    let planner = TripPlanner::from_config(&config)
        .await
        .context("failed to assemble the planner")?;

    eprintln!("✈️  Trip Planner v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.llm.model);
    match &config.db_path {
        Some(path) => eprintln!("   Checkpoints: {}", path.display()),
        None => eprintln!("   Checkpoints: in memory"),
    }
    eprintln!(
        "   Flights: {}",
        if planner.flights_enabled() { "enabled" } else { "disabled" }
    );
    eprintln!("   Describe your trip. Commands: /new, /flights <country-code> <origin city>, /quit\n");

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut session = Session::default();

    while let Some(line) = read_line(&mut input, "> ").await? {
        if line.is_empty() {
            continue;
        }
        match line.as_str() {
            "/quit" | "/exit" => break,
            "/new" => {
                if let Some(thread_id) = session.thread_id.take() {
                    if let Err(e) = planner.discard(&thread_id).await {
                        tracing::warn!(%thread_id, error = %e, "Could not discard thread");
                    }
                }
                session = Session::default();
                eprintln!("Started a new trip.\n");
                continue;
            }
            _ => {}
        }
        if let Some(args) = line.strip_prefix("/flights") {
            session.flights(&planner, args.trim()).await;
            continue;
        }

        session.description = Some(line.clone());
        let mut request = PlanRequest {
            user_input: Some(line),
            user_responses: None,
            thread_id: session.thread_id.take(),
        };

        loop {
            let response = match planner.plan(request).await {
                Ok(response) => response,
                Err(e) => {
                    eprintln!("Error: {e}\n");
                    break;
                }
            };
            session.thread_id = Some(response.thread_id.clone());
            session.destination = response.destination.clone();

            if !response.awaiting_answers {
                print_plan(&response);
                break;
            }

            let Some(answers) = ask_questions(&mut input, &response).await? else {
                break;
            };
            if answers.is_empty() {
                eprintln!("No answers given. Type more details or /new to start over.\n");
                break;
            }
            request = PlanRequest {
                user_input: session.description.clone(),
                user_responses: Some(answers),
                thread_id: session.thread_id.clone(),
            };
        }
    }

    Ok(())
}

#[derive(Default)]
struct Session {
    thread_id: Option<String>,
    description: Option<String>,
    destination: Option<String>,
}

impl Session {
    async fn flights(&self, planner: &TripPlanner, args: &str) {
        let Some((country, origin)) = args.split_once(char::is_whitespace) else {
            eprintln!("Usage: /flights <country-code> <origin city>\n");
            return;
        };
        let Some(destination) = self.destination.as_deref() else {
            eprintln!("Plan a trip first so the destination is known.\n");
            return;
        };
        match planner
            .flight_prices(country.trim(), origin.trim(), destination)
            .await
        {
            Ok(text) => println!("\n{text}\n"),
            Err(e) => eprintln!("Error: {e}\n"),
        }
    }
}

async fn read_line(input: &mut Input, prompt: &str) -> anyhow::Result<Option<String>> {
    eprint!("{prompt}");
    let line = input.next_line().await.context("failed to read stdin")?;
    Ok(line.map(|l| l.trim().to_string()))
}

/// Ask about each field the suspended thread is waiting on, keyed by field.
async fn ask_questions(
    input: &mut Input,
    response: &PlanResponse,
) -> anyhow::Result<Option<UserResponses>> {
    eprintln!("\nI need a few more details:");

    let mut answers = UserResponses::new();
    for field in &response.missing_info {
        let question = question_for(field).unwrap_or(field.as_str());
        let Some(answer) = read_line(input, &format!("  {question} ")).await? else {
            return Ok(None);
        };
        if !answer.is_empty() {
            answers.insert(field.clone(), answer);
        }
    }
    eprintln!();
    Ok(Some(answers))
}

fn print_plan(response: &PlanResponse) {
    match (&response.final_plan, &response.clarifying_questions) {
        (Some(plan), _) => println!("\n{plan}\n"),
        (None, Some(questions)) if !questions.is_empty() => {
            eprintln!("\nStill missing details after several rounds. Describe the trip again with:");
            for question in questions {
                eprintln!("   - {question}");
            }
        }
        _ => eprintln!("\nNo plan could be produced."),
    }
    for error in &response.errors {
        eprintln!("   ⚠️  {error}");
    }
    eprintln!("   Status: {} (thread {})\n", response.status, response.thread_id);
}
