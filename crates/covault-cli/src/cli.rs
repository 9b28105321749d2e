use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use covault_core::VERSION;

/// Covault - a shared credential vault for teams, unlocked by one master passphrase
#[derive(Parser)]
#[command(name = "covault")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the vault database
    #[arg(long, global = true, env = "COVAULT_PATH")]
    pub vault: Option<String>,

    /// Login to act as
    #[arg(short, long, global = true, env = "COVAULT_USER")]
    pub user: Option<String>,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Use ASCII symbols only
    #[arg(long, global = true)]
    pub ascii: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Output-mode flags shared by commands that print results.
#[derive(Args)]
pub struct OutputArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Output format (plain, table)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<String>,
}

/// Arguments for the `init` command
#[derive(Args)]
pub struct InitArgs {
    /// Path where the vault will be created
    #[arg(value_name = "PATH")]
    pub path: Option<String>,

    /// Login for the first administrator
    #[arg(long, default_value = "admin")]
    pub admin: String,

    /// Default user written to the config
    #[arg(long)]
    pub default_user: Option<String>,

    /// Config path override
    #[arg(long)]
    pub config_path: Option<String>,

    /// Do not write a config file
    #[arg(long)]
    pub no_config: bool,
}

/// Search and listing filters shared by `list` and `search`.
#[derive(Args)]
pub struct FilterArgs {
    /// Restrict to a category (by name)
    #[arg(long, value_name = "NAME")]
    pub category: Option<String>,

    /// Restrict to a client (by name)
    #[arg(long, value_name = "NAME")]
    pub client: Option<String>,

    /// Restrict to accounts carrying this tag (repeatable)
    #[arg(short, long, value_name = "TAG")]
    pub tag: Vec<String>,

    /// Require every given tag instead of any
    #[arg(long)]
    pub all_tags: bool,

    /// Only the caller's favorites
    #[arg(long)]
    pub favorites: bool,

    /// Only accounts whose scheduled secret change is overdue
    #[arg(long)]
    pub expired: bool,

    /// Only accounts with no secret change due
    #[arg(long, conflicts_with = "expired")]
    pub current: bool,

    /// Filter by owner login or name, substring (admin only)
    #[arg(long, value_name = "TEXT")]
    pub owner: Option<String>,

    /// Filter by owning group name, substring (admin only)
    #[arg(long, value_name = "TEXT")]
    pub group: Option<String>,

    /// Filter by attached file name, substring (admin only)
    #[arg(long, value_name = "TEXT")]
    pub file: Option<String>,

    /// Filter account names by regular expression (admin only)
    #[arg(long, value_name = "REGEX")]
    pub name_regex: Option<String>,

    /// Sort column
    #[arg(long, value_enum, value_name = "KEY")]
    pub sort: Option<SortField>,

    /// Sort descending
    #[arg(long)]
    pub desc: bool,

    /// Most-viewed accounts first (ignored with --sort)
    #[arg(long)]
    pub top_viewed: bool,

    /// Maximum number of results
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,

    /// Skip the first N results
    #[arg(long, value_name = "N")]
    pub offset: Option<usize>,
}

/// Sort columns exposed on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SortField {
    Name,
    Category,
    Login,
    Url,
    Client,
}

/// Arguments for the `add` command
#[derive(Args)]
pub struct AddArgs {
    /// Account name
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Login stored with the account
    #[arg(short, long, default_value = "")]
    pub login: String,

    /// URL stored with the account
    #[arg(long, default_value = "")]
    pub url: String,

    /// Free-form notes
    #[arg(long, default_value = "")]
    pub notes: String,

    /// Category (by name)
    #[arg(long, value_name = "NAME")]
    pub category: Option<String>,

    /// Client (by name)
    #[arg(long, value_name = "NAME")]
    pub client: Option<String>,

    /// Owning group (by name; defaults to the caller's group)
    #[arg(long, value_name = "NAME")]
    pub group: Option<String>,

    /// Tags to attach (repeatable)
    #[arg(short, long, value_name = "TAG")]
    pub tag: Vec<String>,

    /// Only the owner and administrators may see this account
    #[arg(long)]
    pub private: bool,

    /// Only the owning group and administrators may see this account
    #[arg(long)]
    pub private_group: bool,

    /// Let granted users edit, not just view
    #[arg(long)]
    pub other_user_edit: bool,

    /// Let granted groups edit, not just view
    #[arg(long)]
    pub other_group_edit: bool,

    /// Schedule the next secret change (ISO-8601 or YYYY-MM-DD)
    #[arg(long, value_name = "WHEN")]
    pub expires: Option<String>,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Arguments for the `list` command
#[derive(Args)]
pub struct ListArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Arguments for the `search` command
#[derive(Args)]
pub struct SearchArgs {
    /// Text matched against name, login, URL and notes
    #[arg(value_name = "TEXT")]
    pub text: String,

    #[command(flatten)]
    pub filter: FilterArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Arguments for the `show` command
#[derive(Args)]
pub struct ShowArgs {
    /// Account ID
    #[arg(value_name = "ID")]
    pub id: String,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Arguments for the `pass` command
#[derive(Args)]
pub struct PassArgs {
    /// Account ID
    #[arg(value_name = "ID")]
    pub id: String,
}

/// Arguments for the `edit` command
#[derive(Args)]
pub struct EditArgs {
    /// Account ID
    #[arg(value_name = "ID")]
    pub id: String,

    /// New account name
    #[arg(long)]
    pub name: Option<String>,

    /// New login
    #[arg(long)]
    pub login: Option<String>,

    /// New URL
    #[arg(long)]
    pub url: Option<String>,

    /// New notes
    #[arg(long)]
    pub notes: Option<String>,

    /// New category (by name); empty string clears it
    #[arg(long, value_name = "NAME")]
    pub category: Option<String>,

    /// New client (by name); empty string clears it
    #[arg(long, value_name = "NAME")]
    pub client: Option<String>,

    /// New owning group (by name)
    #[arg(long, value_name = "NAME")]
    pub group: Option<String>,

    /// Replace the tag set (repeatable; pass --clear-tags to remove all)
    #[arg(short, long, value_name = "TAG")]
    pub tag: Vec<String>,

    /// Remove every tag
    #[arg(long)]
    pub clear_tags: bool,

    /// Toggle user privacy
    #[arg(long, value_name = "BOOL")]
    pub private: Option<bool>,

    /// Toggle group privacy
    #[arg(long, value_name = "BOOL")]
    pub private_group: Option<bool>,

    /// Toggle edit rights for granted users
    #[arg(long, value_name = "BOOL")]
    pub other_user_edit: Option<bool>,

    /// Toggle edit rights for granted groups
    #[arg(long, value_name = "BOOL")]
    pub other_group_edit: Option<bool>,

    /// Schedule the next secret change (ISO-8601 or YYYY-MM-DD)
    #[arg(long, value_name = "WHEN")]
    pub expires: Option<String>,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Arguments for the `edit-pass` command
#[derive(Args)]
pub struct EditPassArgs {
    /// Account ID
    #[arg(value_name = "ID")]
    pub id: String,
}

/// Arguments for the `rm` command
#[derive(Args)]
pub struct RmArgs {
    /// Account ID
    #[arg(value_name = "ID")]
    pub id: String,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments for the `copy` command
#[derive(Args)]
pub struct CopyArgs {
    /// Source account ID
    #[arg(value_name = "ID")]
    pub id: String,

    /// Name for the copy
    #[arg(value_name = "NEW_NAME")]
    pub new_name: String,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Arguments for `favorite` and `unfavorite`
#[derive(Args)]
pub struct FavoriteArgs {
    /// Account ID
    #[arg(value_name = "ID")]
    pub id: String,
}

/// Arguments for the `history` command group
#[derive(Args)]
pub struct HistoryArgs {
    #[command(subcommand)]
    pub command: HistorySubcommand,
}

#[derive(Subcommand)]
pub enum HistorySubcommand {
    /// List an account's snapshots, newest first
    List {
        /// Account ID
        #[arg(value_name = "ACCOUNT")]
        account: String,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Show one snapshot
    Show {
        /// History entry ID
        #[arg(value_name = "ENTRY")]
        entry: String,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Reveal the secret captured in a snapshot
    Pass {
        /// History entry ID
        #[arg(value_name = "ENTRY")]
        entry: String,
    },
    /// Restore an account to the state captured in a snapshot
    Restore {
        /// History entry ID
        #[arg(value_name = "ENTRY")]
        entry: String,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Delete snapshots (administrators only)
    Rm {
        /// History entry IDs
        #[arg(value_name = "ENTRY", required = true)]
        entries: Vec<String>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Delete every snapshot of an account (administrators only)
    Purge {
        /// Account ID
        #[arg(value_name = "ACCOUNT")]
        account: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Arguments for the `grant` command group
#[derive(Args)]
pub struct GrantArgs {
    #[command(subcommand)]
    pub command: GrantSubcommand,
}

#[derive(Subcommand)]
pub enum GrantSubcommand {
    /// Show who is granted access to an account
    List {
        /// Account ID
        #[arg(value_name = "ACCOUNT")]
        account: String,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Grant a user access to an account
    User {
        /// Account ID
        #[arg(value_name = "ACCOUNT")]
        account: String,

        /// User login
        #[arg(value_name = "LOGIN")]
        login: String,

        /// Grant edit access instead of view-only
        #[arg(long)]
        edit: bool,

        /// Remove the grant instead of adding it
        #[arg(long)]
        remove: bool,
    },
    /// Grant a group access to an account
    Group {
        /// Account ID
        #[arg(value_name = "ACCOUNT")]
        account: String,

        /// Group name
        #[arg(value_name = "GROUP")]
        group: String,

        /// Grant edit access instead of view-only
        #[arg(long)]
        edit: bool,

        /// Remove the grant instead of adding it
        #[arg(long)]
        remove: bool,
    },
}

/// Arguments for the `attach` command
#[derive(Args)]
pub struct AttachArgs {
    /// Account ID
    #[arg(value_name = "ACCOUNT")]
    pub account: String,

    /// File to attach
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Store under this name instead of the file's own
    #[arg(long, value_name = "NAME")]
    pub name: Option<String>,
}

/// Arguments for the `files` command
#[derive(Args)]
pub struct FilesArgs {
    /// Account ID
    #[arg(value_name = "ACCOUNT")]
    pub account: String,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Arguments for the `detach` command
#[derive(Args)]
pub struct DetachArgs {
    /// Account ID
    #[arg(value_name = "ACCOUNT")]
    pub account: String,

    /// File ID
    #[arg(value_name = "FILE_ID")]
    pub file_id: String,
}

/// Arguments for the `rotate-master` command
#[derive(Args)]
pub struct RotateMasterArgs {
    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Arguments for the `user` command group
#[derive(Args)]
pub struct UserArgs {
    #[command(subcommand)]
    pub command: UserSubcommand,
}

#[derive(Subcommand)]
pub enum UserSubcommand {
    /// Create a user (administrators only)
    Add {
        /// Login for the new user
        #[arg(value_name = "LOGIN")]
        login: String,

        /// Display name
        #[arg(long, default_value = "")]
        name: String,

        /// Group (by name)
        #[arg(long, value_name = "NAME")]
        group: Option<String>,

        /// Start from a read-only profile instead of full account rights
        #[arg(long)]
        read_only: bool,

        /// Application administrator
        #[arg(long)]
        admin_app: bool,

        /// Accounts administrator
        #[arg(long)]
        admin_acc: bool,
    },
    /// List users (administrators only)
    List {
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Disable a user's access
    Disable {
        /// User login
        #[arg(value_name = "LOGIN")]
        login: String,
    },
    /// Re-enable a disabled user
    Enable {
        /// User login
        #[arg(value_name = "LOGIN")]
        login: String,
    },
}

/// Arguments for simple named-record command groups.
#[derive(Args)]
pub struct NamedArgs {
    #[command(subcommand)]
    pub command: NamedSubcommand,
}

#[derive(Subcommand)]
pub enum NamedSubcommand {
    /// Create a record
    Add {
        /// Name for the new record
        #[arg(value_name = "NAME")]
        name: String,
    },
    /// List records
    List {
        #[command(flatten)]
        output: OutputArgs,
    },
}

/// Arguments for the `preset` command group
#[derive(Args)]
pub struct PresetArgs {
    #[command(subcommand)]
    pub command: PresetSubcommand,
}

#[derive(Subcommand)]
pub enum PresetSubcommand {
    /// Create a default-permission preset (administrators only)
    Add {
        /// Preset applies to: user, group, or profile
        #[arg(value_enum, value_name = "KIND")]
        kind: PresetKind,

        /// Target user login, group name, or profile id
        #[arg(value_name = "TARGET")]
        target: String,

        /// Lower numbers win when several presets match
        #[arg(long, default_value_t = 0)]
        priority: i32,

        /// Apply even when explicit grants exist
        #[arg(long)]
        fixed: bool,

        /// Users granted view by this preset (repeatable, by login)
        #[arg(long, value_name = "LOGIN")]
        view_user: Vec<String>,

        /// Users granted edit by this preset (repeatable, by login)
        #[arg(long, value_name = "LOGIN")]
        edit_user: Vec<String>,

        /// Groups granted view by this preset (repeatable, by name)
        #[arg(long, value_name = "GROUP")]
        view_group: Vec<String>,

        /// Groups granted edit by this preset (repeatable, by name)
        #[arg(long, value_name = "GROUP")]
        edit_group: Vec<String>,
    },
    /// List presets (administrators only)
    List {
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Delete a preset (administrators only)
    Rm {
        /// Preset ID
        #[arg(value_name = "ID")]
        id: String,
    },
}

/// Preset target kinds exposed on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PresetKind {
    User,
    Group,
    Profile,
}

/// Arguments for the `completions` command
#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum, value_name = "SHELL")]
    pub shell: Shell,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new vault and its first administrator
    Init(InitArgs),

    /// Add an account with an encrypted secret
    Add(AddArgs),

    /// List accounts visible to you
    List(ListArgs),

    /// Search accounts by text
    Search(SearchArgs),

    /// Show one account's details
    Show(ShowArgs),

    /// Reveal an account's secret
    Pass(PassArgs),

    /// Edit an account's fields
    Edit(EditArgs),

    /// Change an account's secret
    EditPass(EditPassArgs),

    /// Delete an account (a snapshot is kept in history)
    Rm(RmArgs),

    /// Duplicate an account under a fresh content key
    Copy(CopyArgs),

    /// Mark an account as a favorite
    Favorite(FavoriteArgs),

    /// Remove an account from favorites
    Unfavorite(FavoriteArgs),

    /// Inspect and restore account snapshots
    History(HistoryArgs),

    /// Manage per-account access grants
    Grant(GrantArgs),

    /// Attach a file to an account
    Attach(AttachArgs),

    /// List an account's attached files
    Files(FilesArgs),

    /// Remove an attached file
    Detach(DetachArgs),

    /// Re-key the vault under a new master passphrase
    RotateMaster(RotateMasterArgs),

    /// Manage users
    User(UserArgs),

    /// Manage user groups
    Group(NamedArgs),

    /// Manage categories
    Category(NamedArgs),

    /// Manage clients
    Client(NamedArgs),

    /// Manage tags
    Tag(NamedArgs),

    /// Manage default-permission presets
    Preset(PresetArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}
