use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "debtline",
    about = "Debtline: confidential debt lifecycle ledger",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Ledger state file (JSON snapshot)
    #[arg(long, global = true, default_value = "debtline.json")]
    pub state: PathBuf,

    /// Ledger configuration (TOML), used by `init`
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Acting identity: 64 hex chars, or `label:<name>`
    #[arg(long = "as", global = true, value_name = "IDENTITY")]
    pub actor: Option<String>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a new ledger state file
    Init(InitArgs),
    /// Authorize or deauthorize a creditor (owner only)
    Authorize(AuthorizeArgs),
    /// Record a new debt owed by the acting identity
    Create(CreateArgs),
    /// Propose new terms for a debt
    Propose(ProposeArgs),
    /// Vote on a pending proposal as debtor or creditor
    Vote(VoteArgs),
    /// Apply an accepted proposal to its debt
    Execute(ProposalArg),
    /// Mark a debt repaid (debtor only)
    Resolve(DebtArg),
    /// Mark a debt defaulted (owner or creditor)
    Default(DebtArg),
    /// Let another identity read a debt under the restricted policy
    Grant(ReaderArgs),
    /// Withdraw a read grant
    Revoke(ReaderArgs),
    /// Show a debt
    Show(DebtArg),
    /// Show a proposal
    Proposal(ProposalArg),
    /// List debts and proposals of an identity, or proposals against a debt
    List(ListArgs),
    /// Show ledger counters
    Stats,
    /// Show the event log
    Events(EventsArgs),
    /// Verify event chain and record integrity
    Verify,
    /// Generate a fresh identity or sealing key
    Keygen(KeygenArgs),
}

#[derive(Args)]
pub struct InitArgs {
    /// Owner identity; defaults to `--as`
    #[arg(long)]
    pub owner: Option<String>,
    /// Overwrite an existing state file
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct AuthorizeArgs {
    pub creditor: String,
    #[arg(long)]
    pub revoke: bool,
}

#[derive(Args)]
pub struct CreateArgs {
    /// Principal amount
    #[arg(long)]
    pub amount: u64,
    /// Interest rate in basis points
    #[arg(long)]
    pub rate: u64,
    /// Term in days
    #[arg(long)]
    pub term: u32,
    #[arg(long)]
    pub anonymous: bool,
}

#[derive(Args)]
pub struct ProposeArgs {
    pub debt: String,
    #[arg(long)]
    pub amount: u64,
    #[arg(long)]
    pub rate: u64,
    #[arg(long)]
    pub term: u32,
    #[arg(long)]
    pub reason: String,
}

#[derive(Args)]
pub struct VoteArgs {
    pub proposal: String,
    /// Vote against; the default is to approve
    #[arg(long)]
    pub reject: bool,
}

#[derive(Args)]
pub struct DebtArg {
    pub debt: String,
}

#[derive(Args)]
pub struct ProposalArg {
    pub proposal: String,
}

#[derive(Args)]
pub struct ReaderArgs {
    pub debt: String,
    pub reader: String,
}

#[derive(Args)]
pub struct ListArgs {
    /// Identity to list; defaults to `--as`
    pub user: Option<String>,
    /// List proposals against this debt instead
    #[arg(long, conflicts_with = "user")]
    pub debt: Option<String>,
}

#[derive(Args)]
pub struct EventsArgs {
    /// First sequence number to show
    #[arg(long, default_value = "1")]
    pub from: u64,
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

#[derive(Args)]
pub struct KeygenArgs {
    /// Derive the identity from a label instead of at random
    #[arg(long, conflicts_with = "sealing")]
    pub label: Option<String>,
    /// Generate a 32-byte sealing key instead of an identity
    #[arg(long)]
    pub sealing: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init() {
        let cli = Cli::try_parse_from(["debtline", "init", "--owner", "label:owner"]).unwrap();
        if let Command::Init(args) = cli.command {
            assert_eq!(args.owner, Some("label:owner".into()));
            assert!(!args.force);
        } else {
            panic!("wrong command");
        }
        assert_eq!(cli.state, PathBuf::from("debtline.json"));
    }

    #[test]
    fn parse_create() {
        let cli = Cli::try_parse_from([
            "debtline", "create", "--amount", "1000", "--rate", "500", "--term", "365",
            "--anonymous",
        ])
        .unwrap();
        if let Command::Create(args) = cli.command {
            assert_eq!(args.amount, 1000);
            assert_eq!(args.rate, 500);
            assert_eq!(args.term, 365);
            assert!(args.anonymous);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_propose() {
        let cli = Cli::try_parse_from([
            "debtline", "propose", "1", "--amount", "900", "--rate", "300", "--term", "730",
            "--reason", "hardship",
        ])
        .unwrap();
        if let Command::Propose(args) = cli.command {
            assert_eq!(args.debt, "1");
            assert_eq!(args.term, 730);
            assert_eq!(args.reason, "hardship");
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn create_requires_terms() {
        assert!(Cli::try_parse_from(["debtline", "create", "--amount", "1"]).is_err());
    }

    #[test]
    fn parse_vote_reject() {
        let cli = Cli::try_parse_from(["debtline", "vote", "proposal#2", "--reject"]).unwrap();
        if let Command::Vote(args) = cli.command {
            assert_eq!(args.proposal, "proposal#2");
            assert!(args.reject);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "debtline", "show", "1", "--as", "label:bank", "--state", "/tmp/s.json", "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.actor, Some("label:bank".into()));
        assert_eq!(cli.state, PathBuf::from("/tmp/s.json"));
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(matches!(cli.command, Command::Show(_)));
    }

    #[test]
    fn list_debt_conflicts_with_user() {
        assert!(Cli::try_parse_from(["debtline", "list", "label:a", "--debt", "1"]).is_err());
        let cli = Cli::try_parse_from(["debtline", "list", "--debt", "1"]).unwrap();
        if let Command::List(args) = cli.command {
            assert_eq!(args.debt, Some("1".into()));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_events() {
        let cli = Cli::try_parse_from(["debtline", "events", "--from", "3", "-n", "2"]).unwrap();
        if let Command::Events(args) = cli.command {
            assert_eq!(args.from, 3);
            assert_eq!(args.limit, Some(2));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_verbose() {
        let cli = Cli::try_parse_from(["debtline", "--verbose", "verify"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Verify));
    }
}
