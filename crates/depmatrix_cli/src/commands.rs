//! Subcommand handlers. Each resolves the acting user, calls one service and
//! prints the result.

use crate::cli::{
    AccountArgs, Commands, CreateMatrixArgs, EditInfoArgs, HistoryCommands, LoginArgs,
    MatrixCommands, UserCommands,
};
use crate::render::{render_history, render_matrix, render_summaries, render_users};
use depmatrix_core::{
    AuthService, DbError, HistoryListQuery, HistoryService, Matrix, MatrixInfoUpdate,
    MatrixService, NewAttribute, NewMatrix, RepoError, ServiceError, SqliteHistoryRepository,
    SqliteMatrixRepository, SqliteUserRepository, User,
};
use rusqlite::Connection;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("no session token; run `depmatrix login` and pass --token or set DEPMATRIX_TOKEN")]
    MissingToken,
    #[error("failed to read `{path}`: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid matrix data: {0}")]
    Json(#[from] serde_json::Error),
}

pub type CliResult<T> = Result<T, CliError>;

/// Holds the open connection and the caller's token for one invocation.
pub struct Context<'conn> {
    conn: &'conn Connection,
    token: Option<String>,
}

impl<'conn> Context<'conn> {
    pub fn new(conn: &'conn Connection, token: Option<String>) -> Self {
        Self { conn, token }
    }

    fn auth(&self) -> CliResult<AuthService<SqliteUserRepository<'conn>>> {
        Ok(AuthService::new(SqliteUserRepository::try_new(self.conn)?))
    }

    fn matrices(
        &self,
    ) -> CliResult<MatrixService<SqliteMatrixRepository<'conn>, SqliteHistoryRepository<'conn>>>
    {
        Ok(MatrixService::new(
            SqliteMatrixRepository::try_new(self.conn)?,
            SqliteHistoryRepository::try_new(self.conn)?,
        ))
    }

    fn history(&self) -> CliResult<HistoryService<SqliteHistoryRepository<'conn>>> {
        Ok(HistoryService::new(SqliteHistoryRepository::try_new(
            self.conn,
        )?))
    }

    fn token(&self) -> CliResult<&str> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(CliError::MissingToken)
    }

    fn actor(&self) -> CliResult<User> {
        Ok(self.auth()?.require_user(self.token()?)?)
    }
}

pub fn run(ctx: &Context<'_>, command: Commands) -> CliResult<()> {
    match command {
        Commands::InitAdmin(args) => run_init_admin(ctx, args),
        Commands::Register(args) => run_register(ctx, args),
        Commands::Login(args) => run_login(ctx, args),
        Commands::Logout => run_logout(ctx),
        Commands::Whoami => {
            let user = ctx.actor()?;
            println!("{} ({}) {}", user.username, user.role.as_str(), user.id);
            Ok(())
        }
        Commands::Users(command) => run_users(ctx, command),
        Commands::Matrix(command) => run_matrix(ctx, command),
        Commands::History(command) => run_history(ctx, command),
    }
}

fn run_init_admin(ctx: &Context<'_>, args: AccountArgs) -> CliResult<()> {
    let user = ctx
        .auth()?
        .bootstrap_admin(&args.username, &args.email, &args.password)?;
    println!("created admin {} ({})", user.username, user.id);
    Ok(())
}

fn run_register(ctx: &Context<'_>, args: AccountArgs) -> CliResult<()> {
    let user = ctx
        .auth()?
        .register(&args.username, &args.email, &args.password)?;
    println!("created user {} ({})", user.username, user.id);
    Ok(())
}

fn run_login(ctx: &Context<'_>, args: LoginArgs) -> CliResult<()> {
    let session = ctx.auth()?.login(&args.username, &args.password)?;
    eprintln!(
        "logged in as {} ({})",
        session.user.username,
        session.user.role.as_str()
    );
    // Token alone on stdout so it can be captured into DEPMATRIX_TOKEN.
    println!("{}", session.token);
    Ok(())
}

fn run_logout(ctx: &Context<'_>) -> CliResult<()> {
    ctx.auth()?.logout(ctx.token()?)?;
    println!("logged out");
    Ok(())
}

fn run_users(ctx: &Context<'_>, command: UserCommands) -> CliResult<()> {
    let actor = ctx.actor()?;
    let auth = ctx.auth()?;
    match command {
        UserCommands::List { json } => {
            let users = auth.list_users(&actor)?;
            if json {
                return print_json(&users);
            }
            print!("{}", render_users(&users));
        }
        UserCommands::SetRole { user_id, role } => {
            let user = auth.update_user_role(&actor, user_id, role)?;
            println!("{} is now {}", user.username, user.role.as_str());
        }
    }
    Ok(())
}

fn run_matrix(ctx: &Context<'_>, command: MatrixCommands) -> CliResult<()> {
    let actor = ctx.actor()?;
    let matrices = ctx.matrices()?;
    match command {
        MatrixCommands::List { json } => {
            let summaries = matrices.list_matrices(&actor)?;
            if json {
                return print_json(&summaries);
            }
            print!("{}", render_summaries(&summaries));
        }
        MatrixCommands::Create(args) => {
            let record = matrices.create_matrix(&actor, new_matrix_request(args)?)?;
            println!("created matrix {} ({})", record.title, record.id);
        }
        MatrixCommands::Show { id, json } => {
            let record = matrices.open_matrix(&actor, id)?;
            if json {
                return print_json(&record);
            }
            print!("{}", render_matrix(&record));
        }
        MatrixCommands::Unlock { id, keyword } => {
            matrices.unlock_matrix(&actor, id, &keyword)?;
            println!("matrix {id} unlocked");
        }
        MatrixCommands::Toggle { id, row, column } => {
            let toggle = matrices.toggle_cell(&actor, id, row, column)?;
            let state = if toggle.marked { "set" } else { "cleared" };
            println!(
                "{state} {} (row total {}, column total {}, grand total {})",
                toggle.key,
                toggle.totals.row(row),
                toggle.totals.column(column),
                toggle.totals.grand_total()
            );
        }
        MatrixCommands::Submit { id } => {
            let history_id = matrices.submit_matrix(&actor, id)?;
            println!("submitted matrix {id} (history #{history_id})");
        }
        MatrixCommands::AddAttribute {
            id,
            name,
            category,
            attribute_id,
        } => {
            let attribute_id = matrices.add_attribute(
                &actor,
                id,
                NewAttribute {
                    name,
                    category,
                    requested_id: attribute_id,
                },
            )?;
            println!("added attribute {attribute_id}");
        }
        MatrixCommands::RemoveAttribute { id, attribute_id } => {
            report_change(
                matrices.remove_attribute(&actor, id, attribute_id)?,
                attribute_id,
                "removed",
            );
        }
        MatrixCommands::RenameAttribute {
            id,
            attribute_id,
            name,
        } => {
            report_change(
                matrices.rename_attribute(&actor, id, attribute_id, &name)?,
                attribute_id,
                "renamed",
            );
        }
        MatrixCommands::EditInfo(args) => {
            let EditInfoArgs {
                id,
                title,
                description,
                keyword,
            } = args;
            let record = matrices.update_info(
                &actor,
                id,
                &MatrixInfoUpdate {
                    title,
                    description,
                    keyword,
                },
            )?;
            println!("updated matrix {} ({})", record.title, record.id);
        }
        MatrixCommands::Share { id } => {
            let keyword = matrices.share_keyword(&actor, id)?;
            println!("matrix: {id}");
            println!("keyword: {keyword}");
        }
        MatrixCommands::Delete { id } => {
            matrices.delete_matrix(&actor, id)?;
            println!("deleted matrix {id}");
        }
    }
    Ok(())
}

fn run_history(ctx: &Context<'_>, command: HistoryCommands) -> CliResult<()> {
    let actor = ctx.actor()?;
    let history = ctx.history()?;
    match command {
        HistoryCommands::List {
            matrix,
            limit,
            offset,
            json,
        } => {
            let records = history.list(
                &actor,
                &HistoryListQuery {
                    matrix_id: matrix,
                    limit,
                    offset,
                },
            )?;
            if json {
                return print_json(&records);
            }
            print!("{}", render_history(&records));
        }
        HistoryCommands::Show { id } => {
            let record = history.get(&actor, id)?;
            print_json(&record)?;
        }
        HistoryCommands::Delete { id } => {
            history.delete(&actor, id)?;
            println!("deleted history entry #{id}");
        }
    }
    Ok(())
}

fn new_matrix_request(args: CreateMatrixArgs) -> CliResult<NewMatrix> {
    let mut request = NewMatrix::new(args.title, args.description, args.keyword);
    if let Some(path) = args.data_file {
        request.data = Some(read_matrix_file(&path)?);
    }
    Ok(request)
}

fn read_matrix_file(path: &Path) -> CliResult<Matrix> {
    let raw = std::fs::read_to_string(path).map_err(|source| CliError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&raw)?)
}

fn report_change(changed: bool, attribute_id: u32, verb: &str) {
    if changed {
        println!("{verb} attribute {attribute_id}");
    } else {
        println!("attribute {attribute_id} not found; nothing {verb}");
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
