use std::io;
use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::Local;
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Generator, Shell};
use dialoguer::Input;
use tracing_subscriber::EnvFilter;

use classroom_ppt::auth::Credentials;
use classroom_ppt::client::ClassroomClient;
use classroom_ppt::config::Config;
use classroom_ppt::display::{LogSink, SlideSink};
use classroom_ppt::models::Course;
use classroom_ppt::push;
use classroom_ppt::schedule::{courses_for_day, day_offset, describe_course, select_course, week_bounds};
use classroom_ppt::slides::{Session, SlideStore};
use classroom_ppt::watch::watch;

#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
    /// Path to the config file
    #[arg(short, long, default_value = "classroom_ppt.json")]
    file: PathBuf,

    #[command(flatten)]
    options: Options,
}

#[derive(Args, Debug)]
struct Options {
    /// Cookie header value copied from the browser
    #[arg(long, global = true, env = "CLASSROOM_COOKIE", hide_env_values = true)]
    cookie: Option<String>,
    /// One-time CAS login code, used instead of a cookie
    #[arg(long, global = true)]
    code: Option<String>,
    /// Course position in today's schedule, starting at 1
    #[arg(short, long, global = true)]
    course: Option<usize>,
    /// Skip TLS certificate verification for API calls
    #[arg(long, global = true)]
    insecure: bool,
    /// Log new slides instead of opening a window
    #[arg(long, global = true)]
    headless: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Polls for new slides and shows the latest one (default)
    Watch,
    /// Waits for slides pushed over the WebSocket
    Listen,
    /// Prints today's courses
    Schedule,
    /// Generate shell completion script
    Completion {
        /// The shell to generate the script for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    Watch,
    Listen,
}

struct Job {
    mode: Mode,
    config: Config,
    client: ClassroomClient,
    user_id: i64,
    session: Session,
}

impl Job {
    async fn run(self, mut sink: Box<dyn SlideSink>) -> anyhow::Result<()> {
        let mut store = SlideStore::new(self.config.output_dir.clone());
        let task = async {
            match self.mode {
                Mode::Watch => {
                    watch(&self.config, &self.client, &mut store, sink.as_mut(), self.session).await;
                    Ok(())
                }
                Mode::Listen => {
                    push::listen(
                        &self.config,
                        &self.client,
                        &mut store,
                        sink.as_mut(),
                        self.user_id,
                        self.session.course_real_id,
                    )
                    .await
                }
            }
        };

        tokio::select! {
            result = task => result?,
            _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted, stopping"),
        }
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // Default verifying WebSocket connector needs a process-wide provider.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cli = Cli::parse();

    let mode = match &cli.command {
        Some(Commands::Completion { shell }) => {
            generate_completion_script(*shell);
            return Ok(());
        }
        Some(Commands::Schedule) => None,
        Some(Commands::Listen) => Some(Mode::Listen),
        Some(Commands::Watch) | None => Some(Mode::Watch),
    };

    let mut config = Config::load(&cli.file)
        .with_context(|| format!("Invalid configuration file {}", cli.file.display()))?;
    config.accept_invalid_certs |= cli.options.insecure;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;

    let credentials = match (&cli.options.code, &cli.options.cookie) {
        (Some(code), _) => runtime.block_on(ClassroomClient::login_with_code(&config, code))?,
        (None, Some(cookie)) => Credentials::from_cookie_header(cookie)?,
        (None, None) => {
            let cookie: String = Input::new()
                .with_prompt("Paste the Cookie header value copied from the browser")
                .interact_text()?;
            Credentials::from_cookie_header(&cookie)?
        }
    };
    tracing::info!(tenant_code = %credentials.tenant_code, "Credentials loaded");
    tracing::debug!(token = %credentials.token, "Bearer token");

    let client = ClassroomClient::new(&config, credentials)?;
    let (user_id, courses) = runtime.block_on(todays_courses(&client))?;
    if courses.is_empty() {
        bail!("No courses scheduled today");
    }
    for (j, course) in courses.iter().enumerate() {
        println!("{}", describe_course(j + 1, course));
    }

    let Some(mode) = mode else {
        return Ok(());
    };

    let index = match cli.options.course {
        Some(index) => index,
        None => prompt_course(courses.len())?,
    };
    let course = select_course(&courses, index)?;
    tracing::info!(title = %course.course_title, course_id = course.course_id, "Course selected");

    let job = Job {
        mode,
        config,
        client,
        user_id,
        session: Session {
            course_id: course.course_id,
            course_real_id: course.id,
        },
    };

    #[cfg(feature = "gui")]
    if !cli.options.headless {
        let (sink, receiver) = classroom_ppt::gui::channel();
        let window = job.config.window;
        std::thread::spawn(move || {
            if let Err(e) = runtime.block_on(job.run(Box::new(sink))) {
                tracing::error!("{e:#}");
            }
        });
        classroom_ppt::gui::run(window, receiver);
        return Ok(());
    }

    #[cfg(not(feature = "gui"))]
    if !cli.options.headless {
        tracing::debug!("Built without the gui feature, logging slides instead");
    }

    runtime.block_on(job.run(Box::new(LogSink)))
}

async fn todays_courses(client: &ClassroomClient) -> anyhow::Result<(i64, Vec<Course>)> {
    let user_id = client.info_simple().await?.params.id;
    tracing::info!(user_id, "User info loaded");

    let today = Local::now().date_naive();
    let (monday, sunday) = week_bounds(today);
    tracing::info!(%monday, %sunday, "Loading week schedule");

    let schedules = client.week_schedules(user_id, &monday, &sunday).await?;
    let courses = courses_for_day(&schedules, day_offset(today))?.to_vec();
    Ok((user_id, courses))
}

fn prompt_course(count: usize) -> anyhow::Result<usize> {
    let index = Input::<usize>::new()
        .with_prompt("Course index (starting at 1)")
        .validate_with(move |index: &usize| {
            if (1..=count).contains(index) {
                Ok(())
            } else {
                Err(format!("Enter a number between 1 and {count}"))
            }
        })
        .interact_text()?;
    Ok(index)
}

fn generate_completion_script<G: Generator>(gen: G) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(gen, &mut cmd, name, &mut io::stdout());
}
