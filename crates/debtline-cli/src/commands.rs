use std::path::PathBuf;

use anyhow::{anyhow, bail, Context};
use colored::Colorize;
use debtline_crypto::{KeystreamSealer, Sealer};
use debtline_ledger::{Call, DebtReader, DebtWriter, LedgerConfig, LedgerEvent};
use debtline_types::{AccountId, DebtId, DebtStatus, ProposalId, ProposalStatus, SealedValue};
use serde::Serialize;
use serde_json::json;

use crate::cli::*;
use crate::store::{self, Workspace};

/// Global flags shared by every command.
struct Session {
    state: PathBuf,
    config: Option<PathBuf>,
    actor: Option<String>,
    format: OutputFormat,
}

impl Session {
    fn actor(&self) -> anyhow::Result<AccountId> {
        let raw = self
            .actor
            .as_deref()
            .ok_or_else(|| anyhow!("this command needs --as <identity>"))?;
        parse_account(raw)
    }

    /// The reading identity; anonymous readers only pass the open policy.
    fn viewer(&self) -> anyhow::Result<AccountId> {
        match self.actor.as_deref() {
            Some(raw) => parse_account(raw),
            None => Ok(AccountId::ZERO),
        }
    }

    fn call(&self) -> anyhow::Result<Call> {
        Ok(Call::now(self.actor()?))
    }

    fn open(&self) -> anyhow::Result<Workspace> {
        Workspace::open(&self.state)
    }

    /// Print `value` as JSON, or run `text` for human output.
    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce()) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
            OutputFormat::Text => text(),
        }
        Ok(())
    }
}

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let session = Session {
        state: cli.state,
        config: cli.config,
        actor: cli.actor,
        format: cli.format,
    };
    match cli.command {
        Command::Init(args) => cmd_init(&session, args),
        Command::Authorize(args) => cmd_authorize(&session, args),
        Command::Create(args) => cmd_create(&session, args),
        Command::Propose(args) => cmd_propose(&session, args),
        Command::Vote(args) => cmd_vote(&session, args),
        Command::Execute(args) => cmd_execute(&session, args),
        Command::Resolve(args) => cmd_resolve(&session, args),
        Command::Default(args) => cmd_default(&session, args),
        Command::Grant(args) => cmd_read_access(&session, args, true),
        Command::Revoke(args) => cmd_read_access(&session, args, false),
        Command::Show(args) => cmd_show(&session, args),
        Command::Proposal(args) => cmd_proposal(&session, args),
        Command::List(args) => cmd_list(&session, args),
        Command::Stats => cmd_stats(&session),
        Command::Events(args) => cmd_events(&session, args),
        Command::Verify => cmd_verify(&session),
        Command::Keygen(args) => cmd_keygen(&session, args),
    }
}

/// An identity: 64 hex chars, or `label:<name>` for a label-derived one.
pub(crate) fn parse_account(raw: &str) -> anyhow::Result<AccountId> {
    match raw.strip_prefix("label:") {
        Some(label) if !label.is_empty() => Ok(AccountId::from_label(label)),
        Some(_) => bail!("empty identity label"),
        None => raw
            .parse()
            .with_context(|| format!("invalid identity {raw:?}")),
    }
}

fn parse_debt(raw: &str) -> anyhow::Result<DebtId> {
    raw.parse()
        .with_context(|| format!("invalid debt id {raw:?}"))
}

fn parse_proposal(raw: &str) -> anyhow::Result<ProposalId> {
    raw.parse()
        .with_context(|| format!("invalid proposal id {raw:?}"))
}

fn cmd_init(session: &Session, args: InitArgs) -> anyhow::Result<()> {
    let config = match &session.config {
        Some(path) => LedgerConfig::load(path)?,
        None => LedgerConfig::default(),
    };
    let owner = match args.owner.as_deref() {
        Some(raw) => parse_account(raw)?,
        None => session.actor()?,
    };
    let workspace = Workspace::create(&session.state, owner, config, args.force)?;
    let config = workspace.ledger().config();

    session.emit(
        &json!({
            "state": session.state,
            "owner": owner,
            "read_policy": config.read_policy,
            "payload_mode": config.payload_mode,
        }),
        || {
            println!(
                "{} Initialized debtline ledger in {}",
                "✓".green().bold(),
                session.state.display().to_string().bold()
            );
            println!("  Owner: {}", owner.to_hex().cyan());
            println!("  Payloads: {:?}", config.payload_mode);
            println!("  Reads: {:?}", config.read_policy);
        },
    )
}

fn cmd_authorize(session: &Session, args: AuthorizeArgs) -> anyhow::Result<()> {
    let workspace = session.open()?;
    let creditor = parse_account(&args.creditor)?;
    let authorized = !args.revoke;
    workspace
        .ledger()
        .set_authorized_creditor(&session.call()?, creditor, authorized)?;
    workspace.save()?;

    session.emit(
        &json!({ "creditor": creditor, "authorized": authorized }),
        || {
            let verb = if authorized { "Authorized" } else { "Deauthorized" };
            println!("{} {verb} creditor {}", "✓".green().bold(), creditor.to_hex().cyan());
        },
    )
}

fn cmd_create(session: &Session, args: CreateArgs) -> anyhow::Result<()> {
    let workspace = session.open()?;
    let sealer = workspace.sealer()?;
    let id = workspace.ledger().create_debt(
        &session.call()?,
        sealer.seal(args.amount),
        sealer.seal(args.rate),
        args.term,
        args.anonymous,
    )?;
    workspace.save()?;

    session.emit(&json!({ "debt_id": id }), || {
        let kind = if args.anonymous { " anonymous" } else { "" };
        println!(
            "{} Created{kind} {} for {} days",
            "✓".green().bold(),
            id.to_string().yellow().bold(),
            args.term
        );
    })
}

fn cmd_propose(session: &Session, args: ProposeArgs) -> anyhow::Result<()> {
    let workspace = session.open()?;
    let sealer = workspace.sealer()?;
    let debt = parse_debt(&args.debt)?;
    let id = workspace.ledger().propose_restructuring(
        &session.call()?,
        debt,
        sealer.seal(args.amount),
        sealer.seal(args.rate),
        args.term,
        &args.reason,
    )?;
    workspace.save()?;

    session.emit(&json!({ "proposal_id": id, "debt_id": debt }), || {
        println!(
            "{} Filed {} against {}",
            "✓".green().bold(),
            id.to_string().yellow().bold(),
            debt.to_string().yellow()
        );
        println!("  New term: {} days", args.term);
        println!("  Reason: {}", args.reason);
    })
}

fn cmd_vote(session: &Session, args: VoteArgs) -> anyhow::Result<()> {
    let workspace = session.open()?;
    let id = parse_proposal(&args.proposal)?;
    let approve = !args.reject;
    let status = workspace
        .ledger()
        .approve_proposal(&session.call()?, id, approve)?;
    workspace.save()?;

    session.emit(
        &json!({ "proposal_id": id, "approve": approve, "status": status }),
        || {
            let vote = if approve { "yes".green() } else { "no".red() };
            println!(
                "{} Voted {vote} on {}: {}",
                "✓".green().bold(),
                id.to_string().yellow(),
                proposal_status(status)
            );
        },
    )
}

fn cmd_execute(session: &Session, args: ProposalArg) -> anyhow::Result<()> {
    let workspace = session.open()?;
    let id = parse_proposal(&args.proposal)?;
    workspace.ledger().execute_proposal(&session.call()?, id)?;
    workspace.save()?;

    session.emit(&json!({ "proposal_id": id, "executed": true }), || {
        println!("{} Executed {}", "✓".green().bold(), id.to_string().yellow());
    })
}

fn cmd_resolve(session: &Session, args: DebtArg) -> anyhow::Result<()> {
    let workspace = session.open()?;
    let id = parse_debt(&args.debt)?;
    workspace.ledger().mark_debt_resolved(&session.call()?, id)?;
    workspace.save()?;

    session.emit(&json!({ "debt_id": id, "status": DebtStatus::Resolved }), || {
        println!(
            "{} {} is {}",
            "✓".green().bold(),
            id.to_string().yellow(),
            debt_status(DebtStatus::Resolved)
        );
    })
}

fn cmd_default(session: &Session, args: DebtArg) -> anyhow::Result<()> {
    let workspace = session.open()?;
    let id = parse_debt(&args.debt)?;
    workspace.ledger().mark_debt_defaulted(&session.call()?, id)?;
    workspace.save()?;

    session.emit(&json!({ "debt_id": id, "status": DebtStatus::Defaulted }), || {
        println!(
            "{} {} is {}",
            "✓".green().bold(),
            id.to_string().yellow(),
            debt_status(DebtStatus::Defaulted)
        );
    })
}

fn cmd_read_access(session: &Session, args: ReaderArgs, grant: bool) -> anyhow::Result<()> {
    let workspace = session.open()?;
    let debt = parse_debt(&args.debt)?;
    let reader = parse_account(&args.reader)?;
    let call = session.call()?;
    if grant {
        workspace.ledger().grant_read_access(&call, debt, reader)?;
    } else {
        workspace.ledger().revoke_read_access(&call, debt, reader)?;
    }
    workspace.save()?;

    session.emit(
        &json!({ "debt_id": debt, "reader": reader, "granted": grant }),
        || {
            let verb = if grant { "Granted" } else { "Revoked" };
            println!(
                "{} {verb} read access to {} for {}",
                "✓".green().bold(),
                debt.to_string().yellow(),
                reader.to_hex().cyan()
            );
        },
    )
}

fn cmd_show(session: &Session, args: DebtArg) -> anyhow::Result<()> {
    let workspace = session.open()?;
    let id = parse_debt(&args.debt)?;
    let view = workspace.ledger().debt_info(&session.viewer()?, id)?;
    let sealer = workspace.sealer()?;
    let amount = sealer.open(&view.amount).ok();
    let rate = sealer.open(&view.interest_rate).ok();

    session.emit(
        &json!({ "debt": view, "amount": amount, "interest_rate_bps": rate }),
        || {
            println!(
                "Debt {}  {}",
                view.id.to_string().yellow().bold(),
                debt_status(view.status)
            );
            println!("  Debtor: {}", identity(&view.debtor));
            println!("  Amount: {}", sealed(amount, &view.amount));
            println!("  Rate: {} bps", sealed(rate, &view.interest_rate));
            println!(
                "  Term: {} of {} days remaining",
                view.remaining_term_days, view.original_term_days
            );
            println!("  Created: {}  Updated: {}", view.created_at, view.updated_at);
            println!("  Data hash: {}", hex::encode(view.data_hash).dimmed());
        },
    )
}

fn cmd_proposal(session: &Session, args: ProposalArg) -> anyhow::Result<()> {
    let workspace = session.open()?;
    let id = parse_proposal(&args.proposal)?;
    let view = workspace.ledger().proposal_info(&session.viewer()?, id)?;
    let sealer = workspace.sealer()?;
    let amount = sealer.open(&view.new_amount).ok();
    let rate = sealer.open(&view.new_interest_rate).ok();

    session.emit(
        &json!({ "proposal": view, "new_amount": amount, "new_interest_rate_bps": rate }),
        || {
            println!(
                "Proposal {} against {}  {}",
                view.id.to_string().yellow().bold(),
                view.debt_id.to_string().yellow(),
                proposal_status(view.status)
            );
            println!("  Proposer: {}", identity(&view.proposer));
            println!("  New amount: {}", sealed(amount, &view.new_amount));
            println!("  New rate: {} bps", sealed(rate, &view.new_interest_rate));
            println!("  New term: {} days", view.new_term_days);
            println!("  Reason: {}", view.reason);
            println!(
                "  Approvals: debtor {}  creditor {}",
                check(view.debtor_approval),
                check(view.creditor_approval)
            );
        },
    )
}

fn cmd_list(session: &Session, args: ListArgs) -> anyhow::Result<()> {
    let workspace = session.open()?;
    let viewer = session.viewer()?;

    if let Some(raw) = args.debt.as_deref() {
        let debt = parse_debt(raw)?;
        let proposals = workspace.ledger().proposals_for_debt(&viewer, debt)?;
        return session.emit(&json!({ "debt_id": debt, "proposals": proposals }), || {
            println!("Proposals against {}:", debt.to_string().yellow());
            print_ids(&proposals);
        });
    }

    let user = match args.user.as_deref() {
        Some(raw) => parse_account(raw)?,
        None => session.actor()?,
    };
    let debts = workspace.ledger().user_debts(&viewer, &user)?;
    let proposals = workspace.ledger().user_proposals(&viewer, &user)?;
    session.emit(
        &json!({ "user": user, "debts": debts, "proposals": proposals }),
        || {
            println!("Identity {}", user.to_hex().cyan());
            println!("Debts:");
            print_ids(&debts);
            println!("Proposals:");
            print_ids(&proposals);
        },
    )
}

fn cmd_stats(session: &Session) -> anyhow::Result<()> {
    let workspace = session.open()?;
    let stats = workspace.ledger().stats()?;

    session.emit(&stats, || {
        println!(
            "Debts: {} total, {} open, {} anonymous",
            stats.total_debts.to_string().bold(),
            stats.open_debts(),
            stats.anonymous_debts
        );
        println!(
            "  {} active, {} restructuring, {} resolved, {} defaulted",
            stats.active_debts,
            stats.restructuring_debts,
            stats.resolved_debts,
            stats.defaulted_debts
        );
        println!(
            "Proposals: {} total",
            stats.total_proposals.to_string().bold()
        );
        println!(
            "  {} pending, {} accepted, {} rejected, {} executed",
            stats.pending_proposals,
            stats.accepted_proposals,
            stats.rejected_proposals,
            stats.executed_proposals
        );
        println!("Authorized creditors: {}", stats.authorized_creditors);
        println!("Events: {}", stats.event_count);
    })
}

fn cmd_events(session: &Session, args: EventsArgs) -> anyhow::Result<()> {
    let workspace = session.open()?;
    let mut events = workspace.ledger().events_since(args.from)?;
    if let Some(limit) = args.limit {
        events.truncate(limit);
    }

    session.emit(&events, || {
        if events.is_empty() {
            println!("No events.");
        }
        for event in &events {
            print_event(event);
        }
    })
}

fn cmd_verify(session: &Session) -> anyhow::Result<()> {
    let snapshot = store::read_snapshot(&session.state)?;
    let report = snapshot.validate();

    session.emit(&report, || {
        if report.is_valid() {
            println!("{} Ledger integrity verified", "✓".green().bold());
        } else {
            println!("{} Ledger integrity check failed", "✗".red().bold());
        }
        println!("  Hash chain: {}", verdict(report.hash_chain_valid, "valid", "broken"));
        println!(
            "  Sequences: {}",
            verdict(report.sequence_monotonic, "monotonic", "out of order")
        );
        println!(
            "  Records: {}",
            verdict(report.records_consistent, "consistent", "inconsistent")
        );
        println!(
            "  {} debts, {} proposals, {} events",
            report.debt_count, report.proposal_count, report.event_count
        );
        for violation in &report.violations {
            println!(
                "  {} {} {}: {}",
                "!".red().bold(),
                violation.kind.to_string().red(),
                violation.subject,
                violation.description
            );
        }
    })?;

    if !report.is_valid() {
        bail!("{} integrity violations", report.violations.len());
    }
    Ok(())
}

fn cmd_keygen(session: &Session, args: KeygenArgs) -> anyhow::Result<()> {
    if args.sealing {
        let (key, _) = KeystreamSealer::generate();
        let key = hex::encode(key);
        return session.emit(&json!({ "sealing_key": key }), || println!("{key}"));
    }

    let account = match args.label.as_deref() {
        Some(label) => AccountId::from_label(label),
        None => AccountId::ephemeral(),
    };
    session.emit(&json!({ "identity": account }), || {
        println!("{}", account.to_hex())
    })
}

fn print_ids<T: std::fmt::Display>(ids: &[T]) {
    if ids.is_empty() {
        println!("  (none)");
    }
    for id in ids {
        println!("  {}", id.to_string().yellow());
    }
}

fn print_event(event: &LedgerEvent) {
    println!(
        "{:>4} {} {:>10} {} {:<28} {}",
        event.seq,
        event.short_hash().dimmed(),
        event.timestamp,
        identity_short(&event.actor),
        event.kind().to_string().cyan(),
        event.payload.summary()
    );
}

fn identity(account: &AccountId) -> String {
    if account.is_zero() {
        "anonymous".dimmed().to_string()
    } else {
        account.to_hex().cyan().to_string()
    }
}

fn identity_short(account: &AccountId) -> String {
    if account.is_zero() {
        format!("{:<13}", "anonymous").dimmed().to_string()
    } else {
        account.short_id()
    }
}

fn sealed(opened: Option<u64>, raw: &SealedValue) -> String {
    match opened {
        Some(value) => value.to_string(),
        None => format!("sealed ({} bytes)", raw.len()).dimmed().to_string(),
    }
}

fn check(flag: bool) -> colored::ColoredString {
    if flag {
        "✓".green()
    } else {
        "·".dimmed()
    }
}

fn verdict(ok: bool, good: &str, bad: &str) -> colored::ColoredString {
    if ok {
        good.green()
    } else {
        bad.red()
    }
}

fn debt_status(status: DebtStatus) -> colored::ColoredString {
    match status {
        DebtStatus::Active => status.as_str().green(),
        DebtStatus::Restructuring => status.as_str().yellow(),
        DebtStatus::Resolved => status.as_str().blue(),
        DebtStatus::Defaulted => status.as_str().red(),
    }
}

fn proposal_status(status: ProposalStatus) -> colored::ColoredString {
    match status {
        ProposalStatus::Pending => status.as_str().yellow(),
        ProposalStatus::Accepted => status.as_str().green(),
        ProposalStatus::Rejected => status.as_str().red(),
        ProposalStatus::Executed => status.as_str().blue(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(dir: &tempfile::TempDir, actor: Option<&str>) -> Session {
        Session {
            state: dir.path().join("state.json"),
            config: None,
            actor: actor.map(str::to_string),
            format: OutputFormat::Json,
        }
    }

    #[test]
    fn parse_account_forms() {
        assert_eq!(
            parse_account("label:bank").unwrap(),
            AccountId::from_label("bank")
        );
        let hex = AccountId::from_label("x").to_hex();
        assert_eq!(parse_account(&hex).unwrap(), AccountId::from_label("x"));
        assert!(parse_account("label:").is_err());
        assert!(parse_account("nothex").is_err());
    }

    #[test]
    fn ids_accept_both_forms() {
        assert_eq!(parse_debt("3").unwrap().get(), 3);
        assert_eq!(parse_debt("debt#3").unwrap().get(), 3);
        assert_eq!(parse_proposal("proposal#2").unwrap().get(), 2);
        assert!(parse_debt("0").is_err());
    }

    #[test]
    fn mutations_need_an_actor() {
        let dir = tempfile::tempdir().unwrap();
        let anonymous = session(&dir, None);
        assert!(cmd_init(&anonymous, InitArgs { owner: None, force: false }).is_err());
        cmd_init(
            &anonymous,
            InitArgs {
                owner: Some("label:owner".into()),
                force: false,
            },
        )
        .unwrap();
        let err = cmd_create(
            &anonymous,
            CreateArgs {
                amount: 10,
                rate: 10,
                term: 30,
                anonymous: false,
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("--as"));
    }

    #[test]
    fn lifecycle_through_commands() {
        let dir = tempfile::tempdir().unwrap();
        let owner = session(&dir, Some("label:owner"));
        let debtor = session(&dir, Some("label:debtor"));
        let bank = session(&dir, Some("label:bank"));

        cmd_init(&owner, InitArgs { owner: None, force: false }).unwrap();
        cmd_authorize(
            &owner,
            AuthorizeArgs {
                creditor: "label:bank".into(),
                revoke: false,
            },
        )
        .unwrap();
        cmd_create(
            &debtor,
            CreateArgs {
                amount: 1_000,
                rate: 500,
                term: 365,
                anonymous: false,
            },
        )
        .unwrap();
        cmd_propose(
            &debtor,
            ProposeArgs {
                debt: "1".into(),
                amount: 1_000,
                rate: 250,
                term: 730,
                reason: "hardship".into(),
            },
        )
        .unwrap();
        for who in [&debtor, &bank] {
            cmd_vote(
                who,
                VoteArgs {
                    proposal: "1".into(),
                    reject: false,
                },
            )
            .unwrap();
        }
        cmd_execute(&debtor, ProposalArg { proposal: "1".into() }).unwrap();

        let workspace = debtor.open().unwrap();
        let info = workspace
            .ledger()
            .debt_info(&AccountId::from_label("debtor"), DebtId::FIRST)
            .unwrap();
        assert_eq!(info.remaining_term_days, 730);
        assert_eq!(info.status, DebtStatus::Active);
        assert_eq!(workspace.sealer().unwrap().open(&info.interest_rate).unwrap(), 250);

        cmd_verify(&owner).unwrap();
        cmd_resolve(&debtor, DebtArg { debt: "debt#1".into() }).unwrap();
        assert!(cmd_default(&bank, DebtArg { debt: "1".into() }).is_err());
    }
}
