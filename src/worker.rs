//! Worker thread management
//!
//! Generation, export, auth and checkout calls run on dedicated worker
//! threads so the UI loop never waits on the network. Each worker blocks on
//! the shared tokio runtime for the async calls and sends the result back
//! over a crossbeam channel.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use tokio::runtime::Handle;

use crate::account::User;
use crate::adjust::AdjustableResult;
use crate::billing::{self, CheckoutForm, PaymentError, PaymentRedirector, PurchaseItem};
use crate::coordinator::{Delivery, Ticket};
use crate::export::{ExportError, ExportKind, ExportOutcome, ExportRenderer};
use crate::provider::{GeneratedImage, GenerationProvider, ProviderError};
use crate::session::{AuthError, IdentityProvider};
use crate::tools::brand::{self, BrandIdentity, BrandRequest};
use crate::tools::catalog::{self, CatalogRequest};
use crate::tools::logo::{self, LogoRequest};
use crate::tools::menu::{self, MenuDesign, MenuRequest};
use crate::tools::photo::{self, PhotoRequest};
use crate::tools::pricing::{self, PricingInput, PricingStrategy};
use crate::tools::promotion::{self, PromotionRequest};
use crate::tools::social::{self, SocialPost};
use crate::tools::Tool;

/// External services the workers call into.
#[derive(Clone)]
pub struct Services {
    pub runtime: Handle,
    pub provider: Arc<dyn GenerationProvider>,
    pub identity: Arc<dyn IdentityProvider>,
    pub payments: Arc<dyn PaymentRedirector>,
    pub exporter: ExportRenderer,
}

/// Work for a worker thread
#[derive(Debug)]
pub enum Job {
    Menu {
        ticket: Ticket,
        request: MenuRequest,
        with_background: bool,
    },
    /// Re-run the structural pass only.
    MenuText { ticket: Ticket, request: MenuRequest },
    Logo { ticket: Ticket, request: LogoRequest },
    Photo { ticket: Ticket, request: PhotoRequest },
    Pricing { ticket: Ticket, input: PricingInput },
    Social { ticket: Ticket, niche: String },
    Promotion { ticket: Ticket, request: PromotionRequest },
    Catalog { ticket: Ticket, request: CatalogRequest },
    Brand { ticket: Ticket, request: BrandRequest },
    ExportMenu {
        result: AdjustableResult<MenuDesign>,
        kind: ExportKind,
    },
    ExportLogo {
        result: AdjustableResult<GeneratedImage>,
        brand: String,
    },
    ExportPhoto {
        result: AdjustableResult<GeneratedImage>,
        label: String,
    },
    Login { email: String, password: String },
    Register {
        name: String,
        email: String,
        password: String,
    },
    Logout,
    Checkout { item: PurchaseItem, form: CheckoutForm },
}

/// Messages sent from main thread to workers
#[derive(Debug)]
pub enum WorkerMessage {
    Run(Job),
    /// Shutdown signal
    Shutdown,
}

#[derive(Debug)]
pub enum AuthOutcome {
    SignedIn(User),
    Registered,
    SignedOut,
}

/// Responses sent from workers to main thread
#[derive(Debug)]
pub enum WorkerResponse {
    Menu {
        ticket: Ticket,
        result: Result<Delivery<MenuDesign>, ProviderError>,
    },
    MenuText {
        ticket: Ticket,
        result: Result<MenuDesign, ProviderError>,
    },
    Logo {
        ticket: Ticket,
        result: Result<GeneratedImage, ProviderError>,
    },
    Photo {
        ticket: Ticket,
        result: Result<GeneratedImage, ProviderError>,
    },
    Pricing { ticket: Ticket, strategy: PricingStrategy },
    Social {
        ticket: Ticket,
        result: Result<Vec<SocialPost>, ProviderError>,
    },
    Promotion {
        ticket: Ticket,
        result: Result<String, ProviderError>,
    },
    Catalog {
        ticket: Ticket,
        result: Result<String, ProviderError>,
    },
    Brand {
        ticket: Ticket,
        result: Result<BrandIdentity, ProviderError>,
    },
    Exported {
        tool: Tool,
        result: Result<ExportOutcome, ExportError>,
    },
    Auth(Result<AuthOutcome, AuthError>),
    Checkout {
        item: PurchaseItem,
        result: Result<String, PaymentError>,
    },
}

impl WorkerResponse {
    /// The tool and ticket a generation response answers.
    pub fn ticket(&self) -> Option<(Tool, &Ticket)> {
        match self {
            WorkerResponse::Menu { ticket, .. } | WorkerResponse::MenuText { ticket, .. } => Some((Tool::Menu, ticket)),
            WorkerResponse::Logo { ticket, .. } => Some((Tool::Logo, ticket)),
            WorkerResponse::Photo { ticket, .. } => Some((Tool::Photo, ticket)),
            WorkerResponse::Pricing { ticket, .. } => Some((Tool::Pricing, ticket)),
            WorkerResponse::Social { ticket, .. } => Some((Tool::Social, ticket)),
            WorkerResponse::Promotion { ticket, .. } => Some((Tool::Promotion, ticket)),
            WorkerResponse::Catalog { ticket, .. } => Some((Tool::Catalog, ticket)),
            WorkerResponse::Brand { ticket, .. } => Some((Tool::Brand, ticket)),
            WorkerResponse::Exported { .. } | WorkerResponse::Auth(_) | WorkerResponse::Checkout { .. } => None,
        }
    }
}

/// Handle to worker threads and channels
pub struct WorkerHandle {
    pub request_tx: Sender<WorkerMessage>,
    pub response_rx: Receiver<WorkerResponse>,
    threads: Vec<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Shutdown all worker threads
    pub fn shutdown(self) {
        for _ in &self.threads {
            let _ = self.request_tx.send(WorkerMessage::Shutdown);
        }

        for handle in self.threads {
            let _ = handle.join();
        }
    }
}

/// Spawn worker threads. Fails when the OS refuses a thread.
pub fn spawn_workers(services: Services) -> Result<WorkerHandle> {
    let (request_tx, request_rx) = unbounded::<WorkerMessage>();
    let (response_tx, response_rx) = unbounded::<WorkerResponse>();

    let mut threads = Vec::new();

    // one slow generation must not hold up an export
    let num_workers = num_cpus().clamp(2, 4);

    for id in 0..num_workers {
        let rx = request_rx.clone();
        let tx = response_tx.clone();
        let services = services.clone();

        let handle = thread::Builder::new()
            .name(format!("foodcraft-worker-{}", id))
            .spawn(move || worker_loop(rx, tx, services))
            .with_context(|| format!("Failed to spawn worker thread {}", id))?;

        threads.push(handle);
    }

    Ok(WorkerHandle {
        request_tx,
        response_rx,
        threads,
    })
}

/// Main worker loop - processes messages until shutdown
fn worker_loop(rx: Receiver<WorkerMessage>, tx: Sender<WorkerResponse>, services: Services) {
    while let Ok(msg) = rx.recv() {
        match msg {
            WorkerMessage::Shutdown => break,
            WorkerMessage::Run(job) => {
                let start = Instant::now();
                let label = job_label(&job);
                let response = run_job(job, &services);
                tracing::debug!(job = label, elapsed_ms = start.elapsed().as_millis() as u64, "job finished");
                if tx.send(response).is_err() {
                    break;
                }
            }
        }
    }
}

fn job_label(job: &Job) -> &'static str {
    match job {
        Job::Menu { .. } => "menu",
        Job::MenuText { .. } => "menu_text",
        Job::Logo { .. } => "logo",
        Job::Photo { .. } => "photo",
        Job::Pricing { .. } => "pricing",
        Job::Social { .. } => "social",
        Job::Promotion { .. } => "promotion",
        Job::Catalog { .. } => "catalog",
        Job::Brand { .. } => "brand",
        Job::ExportMenu { .. } | Job::ExportLogo { .. } | Job::ExportPhoto { .. } => "export",
        Job::Login { .. } | Job::Register { .. } | Job::Logout => "auth",
        Job::Checkout { .. } => "checkout",
    }
}

fn run_job(job: Job, services: &Services) -> WorkerResponse {
    let provider = services.provider.as_ref();
    let rt = &services.runtime;
    match job {
        Job::Menu {
            ticket,
            request,
            with_background,
        } => WorkerResponse::Menu {
            ticket,
            result: rt.block_on(menu::generate_menu(provider, &request, with_background)),
        },
        Job::MenuText { ticket, request } => WorkerResponse::MenuText {
            ticket,
            result: Ok(rt.block_on(menu::generate_structure(provider, &request))),
        },
        Job::Logo { ticket, request } => WorkerResponse::Logo {
            ticket,
            result: rt.block_on(logo::generate_logo(provider, &request)),
        },
        Job::Photo { ticket, request } => WorkerResponse::Photo {
            ticket,
            result: rt.block_on(photo::enhance_photo(provider, &request)),
        },
        Job::Pricing { ticket, input } => WorkerResponse::Pricing {
            ticket,
            strategy: rt.block_on(pricing::pricing_strategy(provider, &input)),
        },
        Job::Social { ticket, niche } => WorkerResponse::Social {
            ticket,
            result: rt.block_on(social::generate_calendar(provider, &niche)),
        },
        Job::Promotion { ticket, request } => WorkerResponse::Promotion {
            ticket,
            result: rt.block_on(promotion::generate_promotion(provider, &request)),
        },
        Job::Catalog { ticket, request } => WorkerResponse::Catalog {
            ticket,
            result: rt.block_on(catalog::improve_description(provider, &request)),
        },
        Job::Brand { ticket, request } => WorkerResponse::Brand {
            ticket,
            result: rt.block_on(brand::generate_identity(provider, &request)),
        },
        Job::ExportMenu { result, kind } => WorkerResponse::Exported {
            tool: Tool::Menu,
            result: services.exporter.export_menu(&result, kind),
        },
        Job::ExportLogo { result, brand } => WorkerResponse::Exported {
            tool: Tool::Logo,
            result: services.exporter.export_logo(&result, &brand),
        },
        Job::ExportPhoto { result, label } => WorkerResponse::Exported {
            tool: Tool::Photo,
            result: services.exporter.export_photo(&result, &label),
        },
        Job::Login { email, password } => WorkerResponse::Auth(
            rt.block_on(services.identity.login(&email, &password))
                .map(AuthOutcome::SignedIn),
        ),
        Job::Register { name, email, password } => WorkerResponse::Auth(
            rt.block_on(services.identity.register(&name, &email, &password))
                .map(|_| AuthOutcome::Registered),
        ),
        Job::Logout => WorkerResponse::Auth(rt.block_on(services.identity.logout()).map(|_| AuthOutcome::SignedOut)),
        Job::Checkout { item, form } => {
            let result = rt.block_on(billing::start_checkout(services.payments.as_ref(), &item, &form));
            WorkerResponse::Checkout { item, result }
        }
    }
}

/// Get number of CPUs (fallback to 1)
fn num_cpus() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{MemoryProfileStore, User};
    use crate::adjust::AdjustmentLimits;
    use crate::billing::MockPaymentRedirector;
    use crate::config::ExportConfig;
    use crate::coordinator::{GenerationCoordinator, RecordingNotifier};
    use crate::ledger::CreditLedger;
    use crate::provider::OfflineProvider;
    use crate::render::Rasterizer;
    use crate::session::LocalIdentity;
    use std::time::Duration;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap()
    }

    fn services(rt: &tokio::runtime::Runtime, dir: &std::path::Path) -> Services {
        let store = Arc::new(MemoryProfileStore::new());
        Services {
            runtime: rt.handle().clone(),
            provider: Arc::new(OfflineProvider::new()),
            identity: Arc::new(LocalIdentity::new(store)),
            payments: Arc::new(MockPaymentRedirector::new("http://localhost", Duration::ZERO)),
            exporter: ExportRenderer::new(Rasterizer::new(), &ExportConfig::default()).with_output_dir(dir),
        }
    }

    fn recv(workers: &WorkerHandle) -> WorkerResponse {
        workers.response_rx.recv_timeout(Duration::from_secs(10)).unwrap()
    }

    #[test]
    fn test_spawn_and_shutdown() {
        let rt = runtime();
        let dir = tempfile::tempdir().unwrap();
        let workers = spawn_workers(services(&rt, dir.path())).unwrap();
        workers.shutdown();
    }

    #[test]
    fn test_logo_job_round_trip() {
        let rt = runtime();
        let dir = tempfile::tempdir().unwrap();
        let workers = spawn_workers(services(&rt, dir.path())).unwrap();

        let user = User::from_parts("u1".into(), "a@b.c".into(), None, None);
        let ledger = CreditLedger::new(&user, Arc::new(MemoryProfileStore::new()), rt.handle().clone());
        let mut coordinator = GenerationCoordinator::new(
            Tool::Logo,
            ledger.clone(),
            Arc::new(RecordingNotifier::new()),
            AdjustableResult::new(AdjustmentLimits::FREE_TRANSFORM),
        );

        let ticket = coordinator.begin(Tool::Logo.cost()).unwrap();
        let request = LogoRequest {
            brand_name: "Cafe".into(),
            niche: "coffee".into(),
            ..LogoRequest::default()
        };
        workers
            .request_tx
            .send(WorkerMessage::Run(Job::Logo { ticket, request }))
            .unwrap();

        match recv(&workers) {
            WorkerResponse::Logo { ticket, result } => {
                coordinator.finish(ticket, result);
            }
            other => panic!("unexpected response {:?}", other),
        }
        assert!(coordinator.result().has_artifact());
        assert_eq!(ledger.balance(), 2);

        workers.shutdown();
    }

    #[test]
    fn test_catalog_job_answers_its_tool() {
        let rt = runtime();
        let dir = tempfile::tempdir().unwrap();
        let workers = spawn_workers(services(&rt, dir.path())).unwrap();

        let user = User::from_parts("u1".into(), "a@b.c".into(), None, None);
        let ledger = CreditLedger::new(&user, Arc::new(MemoryProfileStore::new()), rt.handle().clone());
        let mut coordinator: GenerationCoordinator<String> = GenerationCoordinator::new(
            Tool::Catalog,
            ledger,
            Arc::new(RecordingNotifier::new()),
            AdjustableResult::new(AdjustmentLimits::FREE_TRANSFORM),
        );
        let ticket = coordinator.begin(0).unwrap();
        let request = CatalogRequest {
            product_name: "Jam".into(),
            current_description: "strawberry jam".into(),
        };
        workers
            .request_tx
            .send(WorkerMessage::Run(Job::Catalog { ticket, request }))
            .unwrap();

        let response = recv(&workers);
        let (tool, ticket) = response.ticket().unwrap();
        assert_eq!(tool, Tool::Catalog);
        assert!(coordinator.owns(ticket));
        match response {
            WorkerResponse::Catalog { ticket, result } => {
                coordinator.finish(ticket, result);
            }
            other => panic!("unexpected response {:?}", other),
        }
        assert!(coordinator.result().artifact().unwrap().contains("Product: Jam"));

        workers.shutdown();
    }

    #[test]
    fn test_export_without_artifact_is_disabled() {
        let rt = runtime();
        let dir = tempfile::tempdir().unwrap();
        let workers = spawn_workers(services(&rt, dir.path())).unwrap();

        workers
            .request_tx
            .send(WorkerMessage::Run(Job::ExportMenu {
                result: AdjustableResult::new(AdjustmentLimits::MENU),
                kind: ExportKind::Document,
            }))
            .unwrap();
        match recv(&workers) {
            WorkerResponse::Exported { tool, result } => {
                assert_eq!(tool, Tool::Menu);
                assert_eq!(result.unwrap(), ExportOutcome::Disabled);
            }
            other => panic!("unexpected response {:?}", other),
        }

        workers.shutdown();
    }

    #[test]
    fn test_checkout_job_returns_redirect() {
        let rt = runtime();
        let dir = tempfile::tempdir().unwrap();
        let workers = spawn_workers(services(&rt, dir.path())).unwrap();

        let form = CheckoutForm {
            name: "Ana".into(),
            email: "a@b.c".into(),
            tax_id: "1".into(),
            cellphone: "2".into(),
        };
        workers
            .request_tx
            .send(WorkerMessage::Run(Job::Checkout {
                item: PurchaseItem::Pack("test_1".into()),
                form,
            }))
            .unwrap();
        match recv(&workers) {
            WorkerResponse::Checkout { item, result } => {
                assert_eq!(item.item_id(), "test_1");
                assert!(billing::is_payment_return(&result.unwrap()));
            }
            other => panic!("unexpected response {:?}", other),
        }

        workers.shutdown();
    }
}
