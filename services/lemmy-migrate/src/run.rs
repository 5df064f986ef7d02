//! Migration run driver
//!
//! Establishes the source set (live main account or backup import), then
//! syncs every satellite account against it. With `update_main` the roles flip:
//! each satellite's subscriptions are pushed into the main account, and an
//! import replaces main's live listing as the comparison baseline.
//!
//! Only a broken source stops the run. A satellite that cannot log in or list
//! its subscriptions is skipped and reported in the summary.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use community_sync::{SyncOptions, SyncReport, backup, sync};
use lemmy_client::{AccountSession, Executor, SessionOptions, SiteIdentity};
use tracing::{info, warn};

use crate::config::{AccountConfig, Config};
use crate::error::{Error, Result};

/// What the user asked for on the command line.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub export: Option<PathBuf>,
    pub import: Option<PathBuf>,
    pub dry_run: bool,
    pub update_main: bool,
}

/// An account left out of the run, with the reason.
#[derive(Debug, Clone)]
pub struct SkippedAccount {
    pub account: String,
    pub reason: String,
}

/// Everything a run did, for the final log lines.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Distinct communities across every source set of the run
    pub source_communities: usize,
    pub reports: Vec<SyncReport>,
    pub skipped: Vec<SkippedAccount>,
}

impl RunSummary {
    fn skip(&mut self, account: &str, reason: impl ToString) {
        let reason = reason.to_string();
        warn!(account, reason = %reason, "skipping account");
        self.skipped.push(SkippedAccount {
            account: account.to_owned(),
            reason,
        });
    }

    pub fn total_succeeded(&self) -> usize {
        self.reports.iter().map(|r| r.succeeded).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.reports.iter().map(|r| r.failed).sum()
    }
}

/// Turns a configured `site` value into the identity sessions talk to.
type SiteResolver = fn(&str) -> lemmy_client::Result<SiteIdentity>;

/// Execute a full migration run.
pub async fn run(config: &Config, options: &RunOptions) -> Result<RunSummary> {
    run_with(config, options, SiteIdentity::normalize).await
}

async fn run_with(config: &Config, options: &RunOptions, site: SiteResolver) -> Result<RunSummary> {
    let driver = Driver {
        config,
        options,
        executor: Executor::new(&config.executor_config()).map_err(Error::Client)?,
        session_options: config.session_options(options.dry_run),
        site,
    };

    if options.dry_run {
        info!("dry run: no subscriptions will be changed");
    }

    if options.update_main {
        driver.update_main().await
    } else {
        driver.sync_satellites().await
    }
}

struct Driver<'a> {
    config: &'a Config,
    options: &'a RunOptions,
    executor: Executor,
    session_options: SessionOptions,
    site: SiteResolver,
}

impl Driver<'_> {
    /// Log in to one account, prompting for a TOTP code when configured.
    async fn open_session(
        &self,
        name: &str,
        account: &AccountConfig,
    ) -> lemmy_client::Result<AccountSession> {
        let site = (self.site)(&account.site)?;
        let mut session = AccountSession::new(
            name,
            site,
            self.executor.clone(),
            self.session_options.clone(),
        );

        let password = account.password.as_ref().ok_or_else(|| {
            lemmy_client::Error::Authentication(Box::new(lemmy_client::Error::NotAuthenticated))
        })?;

        let totp = if account.totp {
            Some(prompt_totp(name).await?)
        } else {
            None
        };

        session
            .login(&account.user, password, totp.as_deref())
            .await?;
        Ok(session)
    }

    async fn open_main(&self) -> Result<(AccountSession, &AccountConfig)> {
        let config = self.config;
        let main_config = config
            .main_account()
            .ok_or_else(|| Error::MissingMain(config.main.clone()))?;
        let session = self
            .open_session(&config.main, main_config)
            .await
            .map_err(|source| Error::MainLogin {
                account: config.main.clone(),
                source,
            })?;
        Ok((session, main_config))
    }

    async fn main_subscriptions(&self, main: &mut AccountSession) -> Result<HashSet<String>> {
        main.subscriptions()
            .await
            .cloned()
            .map_err(|e| Error::SourceListing {
                account: self.config.main.clone(),
                source: e.into(),
            })
    }

    /// Write the main account's set to `path`. Failure is logged, not fatal.
    async fn export(&self, communities: &HashSet<String>, path: &Path) {
        let site = match self.config.main_account().map(|main| (self.site)(&main.site)) {
            Some(Ok(site)) => site,
            Some(Err(e)) => {
                warn!(error = %e, "cannot export backup: invalid main site");
                return;
            }
            None => return,
        };

        if let Err(e) = backup::write(&site, communities, path).await {
            warn!(path = %path.display(), error = %e, "backup export failed, continuing");
        }
    }

    /// Main (or backup) is the source, every satellite a destination.
    async fn sync_satellites(&self) -> Result<RunSummary> {
        let source = match &self.options.import {
            Some(path) => backup::read(path).await.map_err(Error::Import)?,
            None => {
                let (mut main, _) = self.open_main().await?;
                self.main_subscriptions(&mut main).await?
            }
        };

        if let Some(path) = &self.options.export {
            self.export(&source, path).await;
        }

        if source.is_empty() {
            warn!("source has no subscriptions, nothing to migrate");
        }

        let mut summary = RunSummary {
            source_communities: source.len(),
            ..Default::default()
        };

        for (name, account) in self.config.satellites() {
            let mut session = match self.open_session(name, account).await {
                Ok(session) => session,
                Err(e) => {
                    summary.skip(name, e);
                    continue;
                }
            };

            let sync_options = SyncOptions {
                exclusions: account.exclusions(),
                dry_run: self.options.dry_run,
            };
            match sync(&source, &mut session, &sync_options).await {
                Ok(report) => summary.reports.push(report),
                Err(e) => summary.skip(name, e),
            }
        }

        Ok(summary)
    }

    /// Every satellite is a source, main the single destination.
    ///
    /// An import, when given, stands in for main's live subscription list as
    /// the baseline the satellites are compared against.
    async fn update_main(&self) -> Result<RunSummary> {
        let imported = match &self.options.import {
            Some(path) => Some(backup::read(path).await.map_err(Error::Import)?),
            None => None,
        };

        let (mut main, main_config) = self.open_main().await?;
        if let Some(baseline) = imported {
            info!(
                account = %self.config.main,
                communities = baseline.len(),
                "using backup as main's baseline"
            );
            main.seed_subscriptions(baseline);
        }
        let baseline = self.main_subscriptions(&mut main).await?;

        if let Some(path) = &self.options.export {
            self.export(&baseline, path).await;
        }

        let mut summary = RunSummary::default();
        let mut sources = HashSet::new();
        let sync_options = SyncOptions {
            exclusions: main_config.exclusions(),
            dry_run: self.options.dry_run,
        };

        for (name, account) in self.config.satellites() {
            let mut session = match self.open_session(name, account).await {
                Ok(session) => session,
                Err(e) => {
                    summary.skip(name, e);
                    continue;
                }
            };

            let source = match session.subscriptions().await {
                Ok(set) => set.clone(),
                Err(e) => {
                    summary.skip(name, e);
                    continue;
                }
            };
            sources.extend(source.iter().cloned());

            match sync(&source, &mut main, &sync_options).await {
                Ok(report) => summary.reports.push(report),
                Err(e) => summary.skip(name, e),
            }
        }

        summary.source_communities = sources.len();
        Ok(summary)
    }
}

/// Ask for a 2FA code on the terminal without blocking the runtime.
async fn prompt_totp(account: &str) -> lemmy_client::Result<String> {
    let prompt = format!("TOTP 2FA token for {account}");
    let auth_error = |message: String| {
        lemmy_client::Error::Authentication(Box::new(lemmy_client::Error::Decode {
            endpoint: "totp prompt".into(),
            message,
        }))
    };

    tokio::task::spawn_blocking(move || {
        dialoguer::Input::<String>::new()
            .with_prompt(prompt)
            .interact_text()
    })
    .await
    .map_err(|e| auth_error(e.to_string()))?
    .map(|code| code.trim().to_owned())
    .map_err(|e| auth_error(e.to_string()))
}
