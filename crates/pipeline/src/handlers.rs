//! Per-step handlers.
//!
//! Each handler receives the claimed job, drives one external collaborator,
//! and persists the next state itself before returning. Errors propagate to
//! the engine, which owns the retry-vs-permanent-failure decision.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info};

use domainforge_core::{DomainError, DomainJob, DomainRegistrant, JobId, ProvisionStep};
use domainforge_infra::{JobStore, StoreError};
use domainforge_provisioning::{
    DnsProvider, DnsRecord, ProvisionError, ProxyAllowlist, SslStatus, ZoneStatus,
};
use domainforge_registrar::{RegistrarError, RegistrarSelector};

use crate::config::PipelineConfig;

/// Deferral after registration, covering registrar-side propagation.
const REGISTER_DELAY: Duration = Duration::from_secs(30);
/// Deferral after a nameserver change or record creation.
const DNS_DELAY: Duration = Duration::from_secs(60);
/// Re-poll interval while a zone or certificate is still propagating.
const NOT_READY_DELAY: Duration = Duration::from_secs(120);
/// Deferral between certificate activation and the proxy step.
const SSL_DELAY: Duration = Duration::from_secs(10);

/// A step execution failure, surfaced to the engine.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// Data-integrity violation: the registrant record the job references
    /// does not exist. Not recoverable by retrying, but it flows through
    /// the generic failure path and exhausts the attempt budget.
    #[error("registrant record missing for job {0}")]
    MissingRegistrant(JobId),

    /// The legacy DNS branch requires a zone id in metadata.
    #[error("zone id missing for job {0}")]
    MissingZone(JobId),

    #[error(transparent)]
    Registrar(#[from] RegistrarError),

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// The step dispatch table plus the collaborators every handler needs.
pub struct StepHandlers {
    store: Arc<dyn JobStore>,
    registrars: RegistrarSelector,
    dns: Arc<dyn DnsProvider>,
    allowlist: Arc<dyn ProxyAllowlist>,
    config: PipelineConfig,
}

impl StepHandlers {
    pub fn new(
        store: Arc<dyn JobStore>,
        registrars: RegistrarSelector,
        dns: Arc<dyn DnsProvider>,
        allowlist: Arc<dyn ProxyAllowlist>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            registrars,
            dns,
            allowlist,
            config,
        }
    }

    /// Dispatch on the job's current step. The match is exhaustive, so an
    /// unknown step cannot reach execution; it is rejected earlier, when
    /// the stored string fails to parse.
    pub async fn run(&self, job: &mut DomainJob) -> Result<(), StepError> {
        match job.step {
            ProvisionStep::Register => self.register(job).await,
            ProvisionStep::ConfigureNamecomDns => self.configure_registrar_dns(job).await,
            ProvisionStep::ConfigureDns => self.configure_zone_dns(job).await,
            ProvisionStep::ProvisionSsl => self.provision_ssl(job).await,
            ProvisionStep::AddToCaddy => self.add_to_proxy(job).await,
            ProvisionStep::Complete => self.finalize(job).await,
        }
    }

    async fn load_registrant(&self, job: &DomainJob) -> Result<DomainRegistrant, StepError> {
        let id = job
            .metadata
            .registrant_id
            .ok_or(StepError::MissingRegistrant(job.id))?;
        self.store
            .registrant(id)
            .await?
            .ok_or(StepError::MissingRegistrant(job.id))
    }

    /// `register`: purchase the domain, guarded against double purchase.
    ///
    /// When `metadata.registrar_order_id` is already set, a previous attempt
    /// registered the domain but crashed before advancing the step, so the
    /// purchase is skipped and the job moves straight to advancement. A
    /// fresh purchase persists the order id in its own write *before* the
    /// step advances, keeping a crash between the two recoverable.
    async fn register(&self, job: &mut DomainJob) -> Result<(), StepError> {
        let registrant = self.load_registrant(job).await?;

        if let Some(order_id) = &job.metadata.registrar_order_id {
            info!(
                job_id = %job.id,
                domain = %job.domain,
                order_id = %order_id,
                "registration already recorded; skipping purchase"
            );
        } else {
            let registrar = self
                .registrars
                .get(job.metadata.registrar_provider.as_deref())?;
            let registration = registrar
                .register_domain(&job.domain, &registrant, self.config.registration_years)
                .await?;

            info!(
                job_id = %job.id,
                domain = %job.domain,
                provider = registrar.key(),
                order_id = %registration.order_id,
                "domain registered"
            );

            job.metadata.registrar_order_id = Some(registration.order_id);
            job.metadata.registrar_provider = Some(registrar.key().to_string());
            job.updated_at = Utc::now();
            self.store.update_job(job).await?;
        }

        job.advance(ProvisionStep::ConfigureNamecomDns, REGISTER_DELAY)?;
        self.store.update_job(job).await?;
        Ok(())
    }

    /// `configure_namecom_dns`: point the registrar's nameservers at us.
    async fn configure_registrar_dns(&self, job: &mut DomainJob) -> Result<(), StepError> {
        let registrar = self
            .registrars
            .get(job.metadata.registrar_provider.as_deref())?;

        let client_ip = match job.metadata.registrant_id {
            Some(id) => self.store.registrant(id).await?.and_then(|r| r.client_ip),
            None => None,
        };

        registrar
            .set_nameservers(&job.domain, &self.config.nameservers, client_ip.as_deref())
            .await?;

        info!(
            job_id = %job.id,
            domain = %job.domain,
            provider = registrar.key(),
            "nameservers delegated"
        );

        job.advance(ProvisionStep::AddToCaddy, DNS_DELAY)?;
        self.store.update_job(job).await?;
        Ok(())
    }

    /// `configure_dns` (legacy branch): create records once the zone is
    /// active.
    ///
    /// A zone that is still propagating is not a failure: the job is
    /// requeued at the same step without touching `attempts`.
    async fn configure_zone_dns(&self, job: &mut DomainJob) -> Result<(), StepError> {
        let zone_id = job
            .metadata
            .zone_id
            .clone()
            .ok_or(StepError::MissingZone(job.id))?;

        match self.dns.zone_status(&zone_id).await? {
            ZoneStatus::Active => {}
            status => {
                debug!(
                    job_id = %job.id,
                    domain = %job.domain,
                    ?status,
                    "zone not active yet; rescheduling"
                );
                job.reschedule(NOT_READY_DELAY)?;
                self.store.update_job(job).await?;
                return Ok(());
            }
        }

        let apex = DnsRecord {
            record_type: "CNAME".to_string(),
            name: job.domain.clone(),
            content: self.config.origin_host.clone(),
            proxied: true,
        };
        self.dns.create_or_update_record(&zone_id, &apex).await?;

        let www = DnsRecord {
            record_type: "CNAME".to_string(),
            name: format!("www.{}", job.domain),
            content: self.config.origin_host.clone(),
            proxied: true,
        };
        self.dns.create_or_update_record(&zone_id, &www).await?;

        self.dns.set_origin_host_header(&zone_id, &job.domain).await?;
        self.dns.create_www_redirect(&zone_id, &job.domain).await?;

        info!(job_id = %job.id, domain = %job.domain, zone_id = %zone_id, "dns records configured");

        job.advance(ProvisionStep::ProvisionSsl, DNS_DELAY)?;
        self.store.update_job(job).await?;
        Ok(())
    }

    /// `provision_ssl` (legacy branch): enable Universal SSL and poll until
    /// the certificate is active.
    async fn provision_ssl(&self, job: &mut DomainJob) -> Result<(), StepError> {
        let zone_id = job
            .metadata
            .zone_id
            .clone()
            .ok_or(StepError::MissingZone(job.id))?;

        self.dns.enable_universal_ssl(&zone_id).await?;

        match self.dns.ssl_status(&zone_id).await? {
            SslStatus::Active => {}
            status => {
                debug!(
                    job_id = %job.id,
                    domain = %job.domain,
                    ?status,
                    "certificate not active yet; rescheduling"
                );
                job.reschedule(NOT_READY_DELAY)?;
                self.store.update_job(job).await?;
                return Ok(());
            }
        }

        self.store.set_page_ssl_status(job.page_id, "active").await?;
        info!(job_id = %job.id, domain = %job.domain, "certificate active");

        job.advance(ProvisionStep::AddToCaddy, SSL_DELAY)?;
        self.store.update_job(job).await?;
        Ok(())
    }

    /// `add_to_caddy`: the terminal success step. The domain joins the
    /// proxy's TLS allowlist, the owning page goes live, and the job is
    /// completed.
    async fn add_to_proxy(&self, job: &mut DomainJob) -> Result<(), StepError> {
        self.allowlist.add_domain(&job.domain).await?;
        self.store.set_page_domain_active(job.page_id).await?;

        job.complete()?;
        self.store.update_job(job).await?;

        info!(job_id = %job.id, domain = %job.domain, "domain is live");
        Ok(())
    }

    /// A pending job parked at `complete` means the terminal status write
    /// was lost; re-stamp it so the job stops being selected.
    async fn finalize(&self, job: &mut DomainJob) -> Result<(), StepError> {
        job.complete()?;
        self.store.update_job(job).await?;
        Ok(())
    }
}
