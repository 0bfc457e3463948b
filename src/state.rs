//! Application state management
//!
//! Single source of truth for the dashboard. Worker responses, auth events and
//! coordinator signals are all applied here, on the UI thread.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use ratatui::text::Line;
use tokio::runtime::Handle;
use tokio::sync::broadcast;

use crate::account::{ProfileStore, User};
use crate::adjust::{AdjustableResult, Adjustment, AdjustmentLimits};
use crate::billing::{self, CheckoutForm, PurchaseItem, CREDIT_PACKS, PLANS};
use crate::color_space::Rgb;
use crate::config::Config;
use crate::coordinator::{
    ChannelNotifier, Delivery, Gate, GenerationCoordinator, Notice, NoticeLevel, Notifier, Phase, Ticket, UiSignal,
};
use crate::export::{ExportKind, ExportOutcome};
use crate::forms::{
    BrandForm, CatalogForm, LogoForm, MenuForm, PhotoForm, PricingForm, PromotionForm, SettingKind, SocialForm, ToolForm,
};
use crate::ledger::CreditLedger;
use crate::perf_monitor::PerfMetrics;
use crate::prefs::{Preferences, Theme};
use crate::provider::GeneratedImage;
use crate::render::{self, Rasterizer};
use crate::scene::{build_logo_scene, build_menu_scene, build_photo_scene, Scene, SceneOptions};
use crate::session::{validate_login, validate_registration, AuthEvent};
use crate::terminal_capabilities::TerminalCapabilities;
use crate::text::format_price;
use crate::tools::brand::BrandIdentity;
use crate::tools::menu::{self, MenuDesign};
use crate::tools::pricing::PricingStrategy;
use crate::tools::social::SocialPost;
use crate::tools::{Tool, IMAGE_COST};
use crate::worker::{AuthOutcome, Job, WorkerMessage, WorkerResponse};

const SCALE_STEP: f32 = 0.05;
const OFFSET_STEP: f32 = 5.0;
const MENU_ROTATION_STEP: f32 = 0.5;
const FREE_ROTATION_STEP: f32 = 5.0;
const BACKGROUND_FADE: Duration = Duration::from_millis(600);

/// Colors the text swatch keys step through.
const SWATCHES: [Rgb; 6] = [
    Rgb::new(0x1a, 0x1a, 0x1a),
    Rgb::new(0xff, 0xff, 0xff),
    Rgb::new(0xfb, 0xbf, 0x24),
    Rgb::new(0xea, 0x58, 0x0c),
    Rgb::new(0xb9, 0x1c, 0x1c),
    Rgb::new(0x15, 0x80, 0x3d),
];

/// Which widget is currently focused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusedWidget {
    #[default]
    ToolSelector,
    ControlPanel,
    Preview,
}

impl FocusedWidget {
    pub fn next(&self) -> Self {
        match self {
            FocusedWidget::ToolSelector => FocusedWidget::ControlPanel,
            FocusedWidget::ControlPanel => FocusedWidget::Preview,
            FocusedWidget::Preview => FocusedWidget::ToolSelector,
        }
    }

    pub fn prev(&self) -> Self {
        match self {
            FocusedWidget::ToolSelector => FocusedWidget::Preview,
            FocusedWidget::ControlPanel => FocusedWidget::ToolSelector,
            FocusedWidget::Preview => FocusedWidget::ControlPanel,
        }
    }
}

/// Part of a menu the preview keys move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdjustTarget {
    #[default]
    Page,
    Title,
    Content,
    Logo,
}

impl AdjustTarget {
    pub fn name(&self) -> &'static str {
        match self {
            AdjustTarget::Page => "Page",
            AdjustTarget::Title => "Title",
            AdjustTarget::Content => "Content",
            AdjustTarget::Logo => "Logo",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            AdjustTarget::Page => AdjustTarget::Title,
            AdjustTarget::Title => AdjustTarget::Content,
            AdjustTarget::Content => AdjustTarget::Logo,
            AdjustTarget::Logo => AdjustTarget::Page,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AdjustAction {
    Grow,
    Shrink,
    RotateLeft,
    RotateRight,
    Move { dx: f32, dy: f32 },
    NextOverlay,
    NextLayout,
    NextTitleColor,
    NextBodyColor,
    NextPriceColor,
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    Login,
    Register,
}

/// Login / sign-up form shown while signed out
#[derive(Debug, Clone, Default)]
pub struct AuthForm {
    pub mode: AuthMode,
    pub name: String,
    pub email: String,
    pub password: String,
    pub selected: usize,
    /// Inline error from validation or the identity provider.
    pub error: Option<String>,
    pub submitting: bool,
}

impl AuthForm {
    pub fn field_count(&self) -> usize {
        match self.mode {
            AuthMode::Login => 2,
            AuthMode::Register => 3,
        }
    }

    pub fn field_name(&self, index: usize) -> &'static str {
        match (self.mode, index) {
            (AuthMode::Register, 0) => "Name",
            (AuthMode::Register, 1) | (AuthMode::Login, 0) => "Email",
            _ => "Password",
        }
    }

    /// Password characters are masked.
    pub fn field_display(&self, index: usize) -> String {
        match (self.mode, index) {
            (AuthMode::Register, 0) => self.name.clone(),
            (AuthMode::Register, 1) | (AuthMode::Login, 0) => self.email.clone(),
            _ => "•".repeat(self.password.chars().count()),
        }
    }

    pub fn field_mut(&mut self, index: usize) -> &mut String {
        match (self.mode, index) {
            (AuthMode::Register, 0) => &mut self.name,
            (AuthMode::Register, 1) | (AuthMode::Login, 0) => &mut self.email,
            _ => &mut self.password,
        }
    }

    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            AuthMode::Login => AuthMode::Register,
            AuthMode::Register => AuthMode::Login,
        };
        self.selected = 0;
        self.error = None;
    }
}

/// Billing form for one purchase
#[derive(Debug, Clone)]
pub struct CheckoutState {
    pub item: PurchaseItem,
    pub form: CheckoutForm,
    pub selected: usize,
    pub error: Option<String>,
    pub submitting: bool,
}

impl CheckoutState {
    pub const FIELDS: [&'static str; 4] = ["Full name", "Email", "Tax ID", "Cellphone"];

    pub fn field(&self, index: usize) -> &str {
        match index {
            0 => &self.form.name,
            1 => &self.form.email,
            2 => &self.form.tax_id,
            _ => &self.form.cellphone,
        }
    }

    pub fn field_mut(&mut self, index: usize) -> &mut String {
        match index {
            0 => &mut self.form.name,
            1 => &mut self.form.email,
            2 => &mut self.form.tax_id,
            _ => &mut self.form.cellphone,
        }
    }
}

/// Dialog drawn over the dashboard
#[derive(Debug, Clone)]
pub enum Modal {
    Intro(Tool),
    Upsell { tool: Tool, cost: u32 },
    Store { selected: usize },
    Checkout(CheckoutState),
}

/// Paid plans followed by the credit packs.
pub fn store_items() -> Vec<PurchaseItem> {
    PLANS
        .iter()
        .filter(|p| p.price > 0.0)
        .map(|p| PurchaseItem::Plan(p.tier))
        .chain(CREDIT_PACKS.iter().map(|p| PurchaseItem::Pack(p.id.to_string())))
        .collect()
}

/// Status bar message
#[derive(Debug, Clone)]
pub struct StatusLine {
    pub message: String,
    pub level: NoticeLevel,
}

impl StatusLine {
    pub fn set(&mut self, notice: Notice) {
        self.message = notice.message;
        self.level = notice.level;
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

/// Everything that belongs to the signed-in user.
#[derive(Debug)]
pub struct Workspace {
    pub user: User,
    pub ledger: CreditLedger,
    pub menu: GenerationCoordinator<MenuDesign>,
    pub logo: GenerationCoordinator<GeneratedImage>,
    pub photo: GenerationCoordinator<GeneratedImage>,
    pub pricing: GenerationCoordinator<PricingStrategy>,
    pub social: GenerationCoordinator<Vec<SocialPost>>,
    pub promotion: GenerationCoordinator<String>,
    pub catalog: GenerationCoordinator<String>,
    pub brand: GenerationCoordinator<BrandIdentity>,
}

impl Workspace {
    pub fn new(user: User, store: Arc<dyn ProfileStore>, runtime: Handle, notifier: Arc<dyn Notifier>) -> Self {
        let ledger = CreditLedger::new(&user, store, runtime);
        let free = AdjustmentLimits::FREE_TRANSFORM;
        fn coordinator<A>(
            tool: Tool,
            limits: AdjustmentLimits,
            ledger: &CreditLedger,
            notifier: &Arc<dyn Notifier>,
        ) -> GenerationCoordinator<A> {
            GenerationCoordinator::new(tool, ledger.clone(), notifier.clone(), AdjustableResult::new(limits))
        }
        Self {
            menu: coordinator(Tool::Menu, AdjustmentLimits::MENU, &ledger, &notifier),
            logo: coordinator(Tool::Logo, free, &ledger, &notifier),
            photo: coordinator(Tool::Photo, free, &ledger, &notifier),
            pricing: coordinator(Tool::Pricing, free, &ledger, &notifier),
            social: coordinator(Tool::Social, free, &ledger, &notifier),
            promotion: coordinator(Tool::Promotion, free, &ledger, &notifier),
            catalog: coordinator(Tool::Catalog, free, &ledger, &notifier),
            brand: coordinator(Tool::Brand, free, &ledger, &notifier),
            user,
            ledger,
        }
    }

    pub fn is_busy(&self, tool: Tool) -> bool {
        match tool {
            Tool::Menu => self.menu.is_busy(),
            Tool::Logo => self.logo.is_busy(),
            Tool::Photo => self.photo.is_busy(),
            Tool::Pricing => self.pricing.is_busy(),
            Tool::Social => self.social.is_busy(),
            Tool::Promotion => self.promotion.is_busy(),
            Tool::Catalog => self.catalog.is_busy(),
            Tool::Brand => self.brand.is_busy(),
        }
    }

    pub fn has_artifact(&self, tool: Tool) -> bool {
        match tool {
            Tool::Menu => self.menu.result().has_artifact(),
            Tool::Logo => self.logo.result().has_artifact(),
            Tool::Photo => self.photo.result().has_artifact(),
            Tool::Pricing => self.pricing.result().has_artifact(),
            Tool::Social => self.social.result().has_artifact(),
            Tool::Promotion => self.promotion.result().has_artifact(),
            Tool::Catalog => self.catalog.result().has_artifact(),
            Tool::Brand => self.brand.result().has_artifact(),
        }
    }

    /// Whether `ticket` was issued by this workspace's coordinator for `tool`.
    pub fn owns(&self, tool: Tool, ticket: &Ticket) -> bool {
        match tool {
            Tool::Menu => self.menu.owns(ticket),
            Tool::Logo => self.logo.owns(ticket),
            Tool::Photo => self.photo.owns(ticket),
            Tool::Pricing => self.pricing.owns(ticket),
            Tool::Social => self.social.owns(ticket),
            Tool::Promotion => self.promotion.owns(ticket),
            Tool::Catalog => self.catalog.owns(ticket),
            Tool::Brand => self.brand.owns(ticket),
        }
    }

    pub fn phase(&self, tool: Tool) -> Phase {
        match tool {
            Tool::Menu => self.menu.phase(),
            Tool::Logo => self.logo.phase(),
            Tool::Photo => self.photo.phase(),
            Tool::Pricing => self.pricing.phase(),
            Tool::Social => self.social.phase(),
            Tool::Promotion => self.promotion.phase(),
            Tool::Catalog => self.catalog.phase(),
            Tool::Brand => self.brand.phase(),
        }
    }

    pub fn clear_outcome(&mut self, tool: Tool) {
        match tool {
            Tool::Menu => self.menu.clear_outcome(),
            Tool::Logo => self.logo.clear_outcome(),
            Tool::Photo => self.photo.clear_outcome(),
            Tool::Pricing => self.pricing.clear_outcome(),
            Tool::Social => self.social.clear_outcome(),
            Tool::Promotion => self.promotion.clear_outcome(),
            Tool::Catalog => self.catalog.clear_outcome(),
            Tool::Brand => self.brand.clear_outcome(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PreviewKey {
    revision: u64,
    tool: Tool,
    cols: u16,
    rows: u16,
    fade_step: u8,
}

#[derive(Debug, Clone)]
struct PreviewCache {
    key: PreviewKey,
    lines: Vec<Line<'static>>,
}

/// Collaborators the state needs from `main`.
pub struct AppContext {
    pub config: Config,
    pub capabilities: TerminalCapabilities,
    pub worker_tx: Sender<WorkerMessage>,
    pub runtime: Handle,
    pub store: Arc<dyn ProfileStore>,
    pub rasterizer: Rasterizer,
    pub prefs: Preferences,
    /// Where preferences are saved; `None` keeps them in memory.
    pub prefs_path: Option<PathBuf>,
    pub auth_events: Option<broadcast::Receiver<AuthEvent>>,
}

/// Main application state
pub struct AppState {
    // Navigation
    pub tool: Tool,
    pub focus: FocusedWidget,
    pub show_help: bool,
    pub should_quit: bool,
    pub modal: Option<Modal>,
    /// A tool text field is being typed into.
    pub editing: bool,

    // Tool inputs
    pub menu_form: MenuForm,
    pub logo_form: LogoForm,
    pub photo_form: PhotoForm,
    pub pricing_form: PricingForm,
    pub social_form: SocialForm,
    pub promotion_form: PromotionForm,
    pub catalog_form: CatalogForm,
    pub brand_form: BrandForm,
    selected_settings: [usize; Tool::ALL.len()],
    pub adjust_target: AdjustTarget,

    // Session
    pub auth_form: AuthForm,
    pub workspace: Option<Workspace>,
    payment_return_pending: bool,

    pub status: StatusLine,

    // Terminal info
    pub terminal_size: (u16, u16),
    pub capabilities: TerminalCapabilities,
    pub perf_metrics: PerfMetrics,

    pub config: Config,
    pub prefs: Preferences,
    prefs_path: Option<PathBuf>,

    // Preview
    rasterizer: Rasterizer,
    preview_cache: Option<PreviewCache>,
    preview_revision: u64,
    background_arrived: Option<Instant>,

    // Plumbing
    store: Arc<dyn ProfileStore>,
    runtime: Handle,
    notifier: Arc<dyn Notifier>,
    signal_rx: Receiver<UiSignal>,
    auth_rx: Option<broadcast::Receiver<AuthEvent>>,
    worker_tx: Sender<WorkerMessage>,
}

impl AppState {
    pub fn new(ctx: AppContext) -> Self {
        let (signal_tx, signal_rx) = unbounded();
        let show_help = ctx.config.ui.show_help_on_start;
        Self {
            tool: Tool::Menu,
            focus: FocusedWidget::default(),
            show_help,
            should_quit: false,
            modal: None,
            editing: false,

            menu_form: MenuForm::default(),
            logo_form: LogoForm::default(),
            photo_form: PhotoForm::default(),
            pricing_form: PricingForm::default(),
            social_form: SocialForm::default(),
            promotion_form: PromotionForm::default(),
            catalog_form: CatalogForm::default(),
            brand_form: BrandForm::default(),
            selected_settings: [0; Tool::ALL.len()],
            adjust_target: AdjustTarget::default(),

            auth_form: AuthForm::default(),
            workspace: None,
            payment_return_pending: false,

            status: if ctx.rasterizer.has_font() {
                StatusLine {
                    message: "Ready - Press [?] for help".to_string(),
                    level: NoticeLevel::Info,
                }
            } else {
                StatusLine {
                    message: "No font found: menu text cannot be drawn. Set export.font_path.".to_string(),
                    level: NoticeLevel::Error,
                }
            },

            terminal_size: ctx.capabilities.size,
            capabilities: ctx.capabilities,
            perf_metrics: PerfMetrics::new(),

            config: ctx.config,
            prefs: ctx.prefs,
            prefs_path: ctx.prefs_path,

            rasterizer: ctx.rasterizer,
            preview_cache: None,
            preview_revision: 0,
            background_arrived: None,

            store: ctx.store,
            runtime: ctx.runtime,
            notifier: Arc::new(ChannelNotifier::new(signal_tx)),
            signal_rx,
            auth_rx: ctx.auth_events,
            worker_tx: ctx.worker_tx,
        }
    }

    pub fn set_terminal_size(&mut self, width: u16, height: u16) {
        self.terminal_size = (width, height);
    }

    pub fn set_notice(&mut self, notice: Notice) {
        self.status.set(notice);
    }

    pub fn is_signed_in(&self) -> bool {
        self.workspace.is_some()
    }

    pub fn ledger(&self) -> Option<&CreditLedger> {
        self.workspace.as_ref().map(|ws| &ws.ledger)
    }

    pub fn theme(&self) -> Theme {
        self.prefs.theme
    }

    fn bump_preview(&mut self) {
        self.preview_revision = self.preview_revision.wrapping_add(1);
    }

    fn send(&self, job: Job) {
        if self.worker_tx.send(WorkerMessage::Run(job)).is_err() {
            tracing::error!("worker channel closed");
        }
    }

    fn save_prefs(&self) {
        if let Some(path) = &self.prefs_path {
            if let Err(e) = self.prefs.save_to(path) {
                tracing::warn!(error = %e, "failed to save preferences");
            }
        }
    }

    // ---- session ----

    /// Open the dashboard for `user`. Signing in the same user twice is a no-op.
    pub fn sign_in(&mut self, user: User) {
        if self.workspace.as_ref().map(|ws| ws.user.id == user.id).unwrap_or(false) {
            return;
        }
        tracing::info!(user_id = %user.id, credits = user.credits, "signed in");
        let greeting = format!("Welcome, {}!", user.first_name());
        self.workspace = Some(Workspace::new(
            user,
            self.store.clone(),
            self.runtime.clone(),
            self.notifier.clone(),
        ));
        self.auth_form = AuthForm::default();
        self.modal = None;
        self.set_notice(Notice::success(greeting));
        self.bump_preview();

        if self.payment_return_pending {
            self.payment_return_pending = false;
            self.complete_pending_purchase();
        }
        self.maybe_show_intro();
    }

    pub fn sign_out(&mut self) {
        if self.workspace.take().is_some() {
            tracing::info!("signed out");
        }
        self.modal = None;
        self.editing = false;
        self.auth_form = AuthForm::default();
        self.set_notice(Notice::info("Signed out"));
        self.bump_preview();
    }

    /// Apply auth events from the identity provider.
    pub fn poll_auth_events(&mut self) {
        loop {
            let event = match self.auth_rx.as_mut() {
                Some(rx) => rx.try_recv(),
                None => return,
            };
            match event {
                Ok(AuthEvent::SignedIn(user)) => self.sign_in(user),
                Ok(AuthEvent::SignedOut) => {
                    if self.is_signed_in() {
                        self.sign_out();
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "auth events lagged");
                }
                Err(broadcast::error::TryRecvError::Empty) => return,
                Err(broadcast::error::TryRecvError::Closed) => {
                    self.auth_rx = None;
                    return;
                }
            }
        }
    }

    /// Apply upsell requests and notices from the coordinators.
    pub fn drain_signals(&mut self) {
        while let Ok(signal) = self.signal_rx.try_recv() {
            match signal {
                UiSignal::Upsell { tool, cost } => self.modal = Some(Modal::Upsell { tool, cost }),
                UiSignal::Notice(notice) => self.set_notice(notice),
            }
        }
    }

    pub fn submit_auth(&mut self) {
        if self.auth_form.submitting {
            return;
        }
        let form = &self.auth_form;
        let checked = match form.mode {
            AuthMode::Login => validate_login(&form.email, &form.password),
            AuthMode::Register => validate_registration(&form.name, &form.email, &form.password),
        };
        if let Err(e) = checked {
            self.auth_form.error = Some(e.to_string());
            return;
        }
        let job = match form.mode {
            AuthMode::Login => Job::Login {
                email: form.email.trim().to_string(),
                password: form.password.clone(),
            },
            AuthMode::Register => Job::Register {
                name: form.name.trim().to_string(),
                email: form.email.trim().to_string(),
                password: form.password.clone(),
            },
        };
        self.auth_form.error = None;
        self.auth_form.submitting = true;
        self.send(job);
    }

    pub fn logout(&mut self) {
        if self.is_signed_in() {
            self.send(Job::Logout);
        }
    }

    // ---- navigation ----

    pub fn set_tool(&mut self, tool: Tool) {
        if self.tool == tool {
            return;
        }
        self.tool = tool;
        self.editing = false;
        self.adjust_target = AdjustTarget::Page;
        self.set_notice(Notice::info(format!("Switched to {}", tool.name())));
        self.bump_preview();
        self.maybe_show_intro();
    }

    fn maybe_show_intro(&mut self) {
        if !self.is_signed_in() || self.modal.is_some() {
            return;
        }
        let today = chrono::Local::now().date_naive();
        if !self.prefs.intro_dismissed(self.tool, today) {
            self.modal = Some(Modal::Intro(self.tool));
        }
    }

    /// Close the intro; with `for_today` it stays hidden until tomorrow.
    pub fn close_intro(&mut self, for_today: bool) {
        if let Some(Modal::Intro(tool)) = self.modal {
            if for_today {
                self.prefs.dismiss_intro(tool, chrono::Local::now().date_naive());
                self.save_prefs();
            }
            self.modal = None;
        }
    }

    pub fn toggle_theme(&mut self) {
        self.prefs.theme = self.prefs.theme.toggle();
        self.save_prefs();
    }

    fn tool_index(tool: Tool) -> usize {
        Tool::ALL.iter().position(|t| *t == tool).unwrap_or(0)
    }

    pub fn current_form(&self) -> &dyn ToolForm {
        match self.tool {
            Tool::Menu => &self.menu_form,
            Tool::Logo => &self.logo_form,
            Tool::Photo => &self.photo_form,
            Tool::Pricing => &self.pricing_form,
            Tool::Social => &self.social_form,
            Tool::Promotion => &self.promotion_form,
            Tool::Catalog => &self.catalog_form,
            Tool::Brand => &self.brand_form,
        }
    }

    fn current_form_mut(&mut self) -> &mut dyn ToolForm {
        match self.tool {
            Tool::Menu => &mut self.menu_form,
            Tool::Logo => &mut self.logo_form,
            Tool::Photo => &mut self.photo_form,
            Tool::Pricing => &mut self.pricing_form,
            Tool::Social => &mut self.social_form,
            Tool::Promotion => &mut self.promotion_form,
            Tool::Catalog => &mut self.catalog_form,
            Tool::Brand => &mut self.brand_form,
        }
    }

    pub fn current_selected_setting(&self) -> usize {
        self.selected_settings[Self::tool_index(self.tool)]
    }

    pub fn next_setting(&mut self) {
        let count = self.current_form().settings_count();
        let slot = &mut self.selected_settings[Self::tool_index(self.tool)];
        *slot = (*slot + 1) % count;
    }

    pub fn prev_setting(&mut self) {
        let count = self.current_form().settings_count();
        let slot = &mut self.selected_settings[Self::tool_index(self.tool)];
        *slot = if *slot == 0 { count - 1 } else { *slot - 1 };
    }

    /// Step the selected choice or toggle. Returns false for text settings.
    pub fn cycle_setting(&mut self, forward: bool) -> bool {
        let index = self.current_selected_setting();
        let changed = self.current_form_mut().cycle(index, forward);
        if changed {
            self.inputs_changed();
        }
        changed
    }

    /// A finished attempt's outcome no longer describes the edited inputs.
    fn inputs_changed(&mut self) {
        if let Some(ws) = self.workspace.as_mut() {
            ws.clear_outcome(self.tool);
        }
        if self.status.is_error() {
            self.set_notice(Notice::info("Editing: type and press Enter"));
        }
    }

    /// Start typing into the selected setting if it is a text field.
    pub fn start_editing(&mut self) -> bool {
        let index = self.current_selected_setting();
        if self.current_form().setting_kind(index) != SettingKind::Text {
            return false;
        }
        self.editing = true;
        self.set_notice(Notice::info("Editing: type and press Enter"));
        true
    }

    pub fn stop_editing(&mut self) {
        self.editing = false;
    }

    pub fn edit_push(&mut self, c: char) {
        let index = self.current_selected_setting();
        if let Some(field) = self.current_form_mut().text_mut(index) {
            field.push(c);
            self.inputs_changed();
        }
    }

    pub fn edit_pop(&mut self) {
        let index = self.current_selected_setting();
        if let Some(field) = self.current_form_mut().text_mut(index) {
            if field.pop().is_some() {
                self.inputs_changed();
            }
        }
    }

    // ---- generation ----

    fn report_gate(status: &mut StatusLine, tool: Tool, gate: Gate) {
        match gate {
            Gate::Busy => status.set(Notice::info(format!("{} is already working...", tool.name()))),
            // the upsell modal arrives through the notifier
            Gate::Upsell { .. } => {}
        }
    }

    /// Start a generation for the current tool.
    pub fn trigger_generate(&mut self) {
        let tool = self.tool;
        let Some(ws) = self.workspace.as_mut() else {
            return;
        };
        let status = &mut self.status;

        let job = match tool {
            Tool::Menu => {
                let request = self.menu_form.request(ws.logo.result().artifact().cloned());
                if !request.is_ready() {
                    status.set(Notice::info("Add a restaurant name and at least one dish."));
                    return;
                }
                let mut with_background = self.menu_form.background;
                if with_background && !ws.ledger.can_afford(IMAGE_COST) {
                    with_background = false;
                    status.set(Notice::info("No credits left: the menu is generated without background art."));
                }
                let cost = if with_background { IMAGE_COST } else { 0 };
                match ws.menu.begin(cost) {
                    Ok(ticket) => {
                        ws.menu.result_mut().set_style_defaults(request.art_style.defaults());
                        Job::Menu {
                            ticket,
                            request,
                            with_background,
                        }
                    }
                    Err(gate) => return Self::report_gate(status, tool, gate),
                }
            }
            Tool::Logo => {
                let request = self.logo_form.request();
                if !request.is_ready() {
                    status.set(Notice::info("Type the brand name first."));
                    return;
                }
                match ws.logo.begin(IMAGE_COST) {
                    Ok(ticket) => {
                        ws.logo.result_mut().set_style_defaults(request.style.defaults());
                        Job::Logo { ticket, request }
                    }
                    Err(gate) => return Self::report_gate(status, tool, gate),
                }
            }
            Tool::Photo => {
                let request = match self.photo_form.request() {
                    Ok(request) if request.source.is_some() => request,
                    Ok(_) => {
                        status.set(Notice::info("Type the path of a dish photo first."));
                        return;
                    }
                    Err(e) => {
                        status.set(Notice::error(format!("{:#}", e)));
                        return;
                    }
                };
                match ws.photo.begin(IMAGE_COST) {
                    Ok(ticket) => {
                        ws.photo.result_mut().set_style_defaults(request.style.defaults());
                        Job::Photo { ticket, request }
                    }
                    Err(gate) => return Self::report_gate(status, tool, gate),
                }
            }
            Tool::Pricing => {
                let input = self.pricing_form.input();
                if input.product_name.is_empty() {
                    status.set(Notice::info("Type the product name first."));
                    return;
                }
                match ws.pricing.begin(0) {
                    Ok(ticket) => Job::Pricing { ticket, input },
                    Err(gate) => return Self::report_gate(status, tool, gate),
                }
            }
            Tool::Social => {
                let niche = self.social_form.niche.trim().to_string();
                if niche.is_empty() {
                    status.set(Notice::info("Type your niche first."));
                    return;
                }
                match ws.social.begin(0) {
                    Ok(ticket) => Job::Social { ticket, niche },
                    Err(gate) => return Self::report_gate(status, tool, gate),
                }
            }
            Tool::Promotion => {
                let request = self.promotion_form.request.clone();
                if request.product.trim().is_empty() {
                    status.set(Notice::info("Type the product first."));
                    return;
                }
                match ws.promotion.begin(0) {
                    Ok(ticket) => Job::Promotion { ticket, request },
                    Err(gate) => return Self::report_gate(status, tool, gate),
                }
            }
            Tool::Catalog => {
                let request = self.catalog_form.request.clone();
                if !request.is_ready() {
                    status.set(Notice::info("Type the product name first."));
                    return;
                }
                match ws.catalog.begin(0) {
                    Ok(ticket) => Job::Catalog { ticket, request },
                    Err(gate) => return Self::report_gate(status, tool, gate),
                }
            }
            Tool::Brand => {
                let request = self.brand_form.request.clone();
                if !request.is_ready() {
                    status.set(Notice::info("Type the brand name and industry first."));
                    return;
                }
                match ws.brand.begin(0) {
                    Ok(ticket) => Job::Brand { ticket, request },
                    Err(gate) => return Self::report_gate(status, tool, gate),
                }
            }
        };

        self.set_notice(Notice::info(format!("{}: generating...", tool.name())));
        self.bump_preview();
        self.send(job);
    }

    /// Re-run the free structural pass and keep the current background.
    pub fn trigger_text_refresh(&mut self) {
        if self.tool != Tool::Menu {
            return;
        }
        let Some(ws) = self.workspace.as_mut() else {
            return;
        };
        if !ws.menu.result().has_artifact() {
            self.status.set(Notice::info("Generate a menu first."));
            return;
        }
        let request = self.menu_form.request(ws.logo.result().artifact().cloned());
        match ws.menu.begin(0) {
            Ok(ticket) => {
                self.status.set(Notice::info("Refreshing menu text..."));
                self.send(Job::MenuText { ticket, request });
            }
            Err(gate) => Self::report_gate(&mut self.status, Tool::Menu, gate),
        }
    }

    pub fn trigger_export(&mut self, kind: ExportKind) {
        let Some(ws) = self.workspace.as_ref() else {
            return;
        };
        if !ws.has_artifact(self.tool) {
            self.set_notice(Notice::info("Nothing to export yet."));
            return;
        }
        let job = match (self.tool, kind) {
            (Tool::Menu, _) => Job::ExportMenu {
                result: ws.menu.result().clone(),
                kind,
            },
            (Tool::Logo, ExportKind::Image) => Job::ExportLogo {
                result: ws.logo.result().clone(),
                brand: self.logo_form.brand_name.clone(),
            },
            (Tool::Photo, ExportKind::Image) => Job::ExportPhoto {
                result: ws.photo.result().clone(),
                label: self.photo_form.style.name().to_string(),
            },
            _ => {
                self.set_notice(Notice::info(format!("{} has no {} export", self.tool.name(), kind.extension())));
                return;
            }
        };
        self.set_notice(Notice::info("Exporting..."));
        self.send(job);
    }

    /// Handle response from worker thread
    pub fn handle_worker_response(&mut self, response: WorkerResponse) {
        match response {
            WorkerResponse::Auth(result) => return self.handle_auth_result(result),
            WorkerResponse::Checkout { item, result } => {
                if let Some(Modal::Checkout(checkout)) = self.modal.as_mut() {
                    checkout.submitting = false;
                    if let Err(e) = &result {
                        checkout.error = Some(e.to_string());
                    }
                }
                if let Ok(url) = result {
                    self.checkout_redirected(item, &url);
                }
                return;
            }
            WorkerResponse::Exported { tool, result } => {
                let notice = match result {
                    Ok(ExportOutcome::Written(path)) => Notice::success(format!("Saved {}", path.display())),
                    Ok(ExportOutcome::Disabled) => Notice::info("Nothing to export yet."),
                    Err(e) => {
                        tracing::warn!(tool = %tool, error = %e, "export failed");
                        Notice::error(format!("Export failed: {}", e))
                    }
                };
                return self.set_notice(notice);
            }
            _ => {}
        }

        let Some(ws) = self.workspace.as_mut() else {
            tracing::debug!("dropping generation result after sign-out");
            return;
        };
        if let Some((tool, ticket)) = response.ticket() {
            if !ws.owns(tool, ticket) {
                tracing::debug!(tool = %tool, "dropping generation result from an earlier session");
                return;
            }
        }
        let (tool, phase, success) = match response {
            WorkerResponse::Menu { ticket, result } => {
                let partial = matches!(result, Ok(Delivery::Partial(..)));
                let with_background = matches!(&result, Ok(Delivery::Complete(d)) if d.background.is_some());
                let cost = ticket.cost();
                let phase = ws.menu.finish_delivery(ticket, result);
                if phase == Phase::Success && with_background {
                    self.background_arrived = Some(Instant::now());
                }
                let message = match (partial, cost) {
                    (true, _) => None,
                    (false, 0) => Some("Menu ready.".to_string()),
                    (false, c) => Some(format!("Menu ready. {} credit used.", c)),
                };
                (Tool::Menu, phase, message)
            }
            WorkerResponse::MenuText { ticket, result } => {
                let phase = ws.menu.finish_update(ticket, result, menu::apply_text_refresh);
                (Tool::Menu, phase, Some("Menu text refreshed.".to_string()))
            }
            WorkerResponse::Logo { ticket, result } => {
                let phase = ws.logo.finish(ticket, result);
                (Tool::Logo, phase, Some("Logo ready. 1 credit used.".to_string()))
            }
            WorkerResponse::Photo { ticket, result } => {
                let phase = ws.photo.finish(ticket, result);
                (Tool::Photo, phase, Some("Photo ready. 1 credit used.".to_string()))
            }
            WorkerResponse::Pricing { ticket, strategy } => {
                let phase = ws.pricing.finish(ticket, Ok(strategy));
                (Tool::Pricing, phase, Some("Pricing strategy ready.".to_string()))
            }
            WorkerResponse::Social { ticket, result } => {
                let phase = ws.social.finish(ticket, result);
                self.social_form.selected_post = 0;
                (Tool::Social, phase, Some("Posting calendar ready.".to_string()))
            }
            WorkerResponse::Promotion { ticket, result } => {
                let phase = ws.promotion.finish(ticket, result);
                (Tool::Promotion, phase, Some("Promotion text ready.".to_string()))
            }
            WorkerResponse::Catalog { ticket, result } => {
                let phase = ws.catalog.finish(ticket, result);
                (Tool::Catalog, phase, Some("Catalog description ready.".to_string()))
            }
            WorkerResponse::Brand { ticket, result } => {
                let phase = ws.brand.finish(ticket, result);
                (Tool::Brand, phase, Some("Brand identity ready.".to_string()))
            }
            WorkerResponse::Auth(_) | WorkerResponse::Checkout { .. } | WorkerResponse::Exported { .. } => return,
        };

        if phase == Phase::Success {
            if let Some(message) = success {
                self.set_notice(Notice::success(message));
            }
        }
        tracing::debug!(tool = %tool, ?phase, "worker response applied");
        self.bump_preview();
    }

    fn handle_auth_result(&mut self, result: Result<AuthOutcome, crate::session::AuthError>) {
        self.auth_form.submitting = false;
        match result {
            Ok(AuthOutcome::SignedIn(user)) => self.sign_in(user),
            Ok(AuthOutcome::Registered) => {
                let email = self.auth_form.email.clone();
                self.auth_form = AuthForm {
                    email,
                    selected: 1,
                    ..AuthForm::default()
                };
                self.set_notice(Notice::success("Account created. Sign in to continue."));
            }
            Ok(AuthOutcome::SignedOut) => {
                if self.is_signed_in() {
                    self.sign_out();
                }
            }
            Err(e) => {
                if self.is_signed_in() {
                    self.set_notice(Notice::error(e.to_string()));
                } else {
                    self.auth_form.error = Some(e.to_string());
                }
            }
        }
    }

    // ---- billing ----

    pub fn open_store(&mut self) {
        if self.is_signed_in() {
            self.modal = Some(Modal::Store { selected: 0 });
        }
    }

    pub fn start_checkout(&mut self, item: PurchaseItem) {
        let Some(ws) = self.workspace.as_ref() else {
            return;
        };
        let form = CheckoutForm {
            name: ws.user.name.clone(),
            email: ws.user.email.clone(),
            ..CheckoutForm::default()
        };
        self.modal = Some(Modal::Checkout(CheckoutState {
            item,
            form,
            selected: 0,
            error: None,
            submitting: false,
        }));
    }

    pub fn submit_checkout(&mut self) {
        let Some(Modal::Checkout(checkout)) = self.modal.as_mut() else {
            return;
        };
        if checkout.submitting {
            return;
        }
        if let Err(e) = checkout.form.validate() {
            checkout.error = Some(e.to_string());
            return;
        }
        checkout.error = None;
        checkout.submitting = true;
        let job = Job::Checkout {
            item: checkout.item.clone(),
            form: checkout.form.clone(),
        };
        self.send(job);
    }

    fn checkout_redirected(&mut self, item: PurchaseItem, url: &str) {
        tracing::info!(item = item.item_id(), url, "payment redirect");
        self.prefs.pending_purchase = Some(item);
        self.save_prefs();
        self.modal = None;
        self.set_notice(Notice::info(format!("Payment page: {}", url)));
        self.handle_payment_return(url);
    }

    /// Complete a pending purchase when `url` is a successful payment return.
    ///
    /// While signed out the purchase is applied at the next sign-in.
    pub fn handle_payment_return(&mut self, url: &str) -> bool {
        if !billing::is_payment_return(url) {
            return false;
        }
        if self.is_signed_in() {
            self.complete_pending_purchase();
        } else {
            self.payment_return_pending = true;
        }
        true
    }

    fn complete_pending_purchase(&mut self) {
        let Some(item) = self.prefs.pending_purchase.clone() else {
            self.set_notice(Notice::info("No purchase is waiting for payment."));
            return;
        };
        let Some(ws) = self.workspace.as_ref() else {
            return;
        };
        let notice = match billing::apply_purchase(&ws.ledger, &item) {
            Ok(balance) => {
                self.prefs.pending_purchase = None;
                self.save_prefs();
                Notice::success(format!(
                    "Payment confirmed: {} added, {} credits available.",
                    item.description(),
                    balance
                ))
            }
            Err(e) => Notice::error(format!("Could not apply the purchase: {}", e)),
        };
        self.set_notice(notice);
    }

    // ---- adjustments ----

    pub fn cycle_adjust_target(&mut self) {
        if self.tool == Tool::Menu {
            self.adjust_target = self.adjust_target.next();
            self.set_notice(Notice::info(format!("Adjusting: {}", self.adjust_target.name())));
        }
    }

    pub fn adjust(&mut self, action: AdjustAction) {
        let Some(ws) = self.workspace.as_mut() else {
            return;
        };
        let changed = match self.tool {
            Tool::Menu => apply_adjust(ws.menu.result_mut(), action, self.adjust_target, MENU_ROTATION_STEP),
            Tool::Logo if action != AdjustAction::NextLayout => {
                apply_adjust(ws.logo.result_mut(), action, AdjustTarget::Page, FREE_ROTATION_STEP)
            }
            Tool::Photo if action != AdjustAction::NextLayout => {
                apply_adjust(ws.photo.result_mut(), action, AdjustTarget::Page, FREE_ROTATION_STEP)
            }
            _ => false,
        };
        if changed {
            self.bump_preview();
        }
    }

    // ---- preview ----

    fn background_fade(&self) -> f32 {
        match self.background_arrived {
            Some(at) => (at.elapsed().as_secs_f32() / BACKGROUND_FADE.as_secs_f32()).min(1.0),
            None => 1.0,
        }
    }

    /// Scene for the current image tool, if it has an artifact.
    pub fn preview_scene(&self) -> Option<Scene> {
        let ws = self.workspace.as_ref()?;
        let options = |busy: bool| SceneOptions {
            busy,
            background_fade: self.background_fade(),
        };
        match self.tool {
            Tool::Menu => {
                let result = ws.menu.result();
                Some(build_menu_scene(
                    result.artifact()?,
                    result.adjustments(),
                    options(ws.menu.is_busy()),
                ))
            }
            Tool::Logo => {
                let result = ws.logo.result();
                Some(build_logo_scene(
                    result.artifact()?,
                    result.adjustments(),
                    options(ws.logo.is_busy()),
                ))
            }
            Tool::Photo => {
                let result = ws.photo.result();
                Some(build_photo_scene(
                    result.artifact()?,
                    result.adjustments(),
                    options(ws.photo.is_busy()),
                ))
            }
            _ => None,
        }
    }

    /// Half-block lines for a `cols` x `rows` pane, cached until something changes.
    pub fn preview_lines(&mut self, cols: u16, rows: u16) -> Option<&[Line<'static>]> {
        let key = PreviewKey {
            revision: self.preview_revision,
            tool: self.tool,
            cols,
            rows,
            fade_step: (self.background_fade() * 10.0).round() as u8,
        };
        if self.preview_cache.as_ref().map(|c| c.key) != Some(key) {
            let scene = self.preview_scene()?;
            let start = Instant::now();
            match render::preview_lines(&self.rasterizer, &scene, cols, rows, self.capabilities.color_support) {
                Ok(lines) => {
                    self.perf_metrics.record_raster(start.elapsed());
                    self.preview_cache = Some(PreviewCache { key, lines });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "preview raster failed");
                    return None;
                }
            }
        }
        self.preview_cache.as_ref().map(|c| c.lines.as_slice())
    }

    pub fn select_post(&mut self, forward: bool) {
        let count = self
            .workspace
            .as_ref()
            .and_then(|ws| ws.social.result().artifact().map(Vec::len))
            .unwrap_or(0);
        if count == 0 {
            return;
        }
        let current = self.social_form.selected_post.min(count - 1);
        self.social_form.selected_post = if forward {
            (current + 1) % count
        } else {
            (current + count - 1) % count
        };
    }

    /// Text the copy key puts on the clipboard for the current tool.
    pub fn clipboard_text(&self) -> Option<String> {
        let ws = self.workspace.as_ref()?;
        match self.tool {
            Tool::Pricing => ws.pricing.result().artifact().map(pricing_text),
            Tool::Social => ws
                .social
                .result()
                .artifact()?
                .get(self.social_form.selected_post)
                .map(SocialPost::to_clipboard),
            Tool::Promotion => ws.promotion.result().artifact().cloned(),
            Tool::Catalog => ws.catalog.result().artifact().cloned(),
            Tool::Brand => ws.brand.result().artifact().map(BrandIdentity::to_clipboard),
            Tool::Menu | Tool::Logo | Tool::Photo => None,
        }
    }
}

fn pricing_text(strategy: &PricingStrategy) -> String {
    let mut out = format!(
        "Ideal price: {}\nNet profit: {}\n",
        format_price(strategy.ideal_price),
        format_price(strategy.net_profit)
    );
    if !strategy.combos.is_empty() {
        out.push_str("\nCombos:\n");
        for combo in &strategy.combos {
            out.push_str(&format!("- {}\n", combo));
        }
    }
    out.push('\n');
    out.push_str(&strategy.strategy);
    out
}

fn next_swatch(current: Rgb) -> Rgb {
    let idx = SWATCHES.iter().position(|c| *c == current);
    match idx {
        Some(i) => SWATCHES[(i + 1) % SWATCHES.len()],
        None => SWATCHES[0],
    }
}

/// Translate a key action into one clamped adjustment.
fn apply_adjust<A>(
    result: &mut AdjustableResult<A>,
    action: AdjustAction,
    target: AdjustTarget,
    rotation_step: f32,
) -> bool {
    if !result.has_artifact() {
        return false;
    }
    let adj = *result.adjustments();
    let scale_delta = match action {
        AdjustAction::Grow => SCALE_STEP,
        AdjustAction::Shrink => -SCALE_STEP,
        _ => 0.0,
    };
    let update = match action {
        AdjustAction::Reset => {
            result.reset();
            return true;
        }
        AdjustAction::Grow | AdjustAction::Shrink => match target {
            AdjustTarget::Page => Adjustment::Scale(adj.scale + scale_delta),
            AdjustTarget::Title => Adjustment::TitleScale(adj.title.scale + scale_delta),
            AdjustTarget::Content => Adjustment::ContentScale(adj.content.scale + scale_delta),
            AdjustTarget::Logo => Adjustment::LogoScale(adj.logo_scale + scale_delta),
        },
        AdjustAction::RotateLeft => Adjustment::Rotation(adj.rotation - rotation_step),
        AdjustAction::RotateRight => Adjustment::Rotation(adj.rotation + rotation_step),
        AdjustAction::Move { dx, dy } => match target {
            AdjustTarget::Page if dx != 0.0 => Adjustment::OffsetX(adj.offset_x + dx * OFFSET_STEP),
            AdjustTarget::Page => Adjustment::OffsetY(adj.offset_y + dy * OFFSET_STEP),
            AdjustTarget::Title => Adjustment::TitleOffsetY(adj.title.offset_y + dy * OFFSET_STEP),
            AdjustTarget::Content => Adjustment::ContentOffsetY(adj.content.offset_y + dy * OFFSET_STEP),
            AdjustTarget::Logo => return false,
        },
        AdjustAction::NextOverlay => Adjustment::Overlay(adj.overlay.next()),
        AdjustAction::NextLayout => Adjustment::Layout(adj.layout.next()),
        AdjustAction::NextTitleColor => Adjustment::TitleColor(next_swatch(adj.palette.title)),
        AdjustAction::NextBodyColor => Adjustment::BodyColor(next_swatch(adj.palette.body)),
        AdjustAction::NextPriceColor => Adjustment::PriceColor(next_swatch(adj.palette.price)),
    };
    result.set_adjustment(update);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{MemoryProfileStore, PlanTier, Profile};
    use crate::adjust::OverlayMode;
    use crate::provider::{OfflineProvider, ProviderError};

    struct Harness {
        _rt: tokio::runtime::Runtime,
        state: AppState,
        jobs: Receiver<WorkerMessage>,
        _dir: tempfile::TempDir,
    }

    fn harness() -> Harness {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let (worker_tx, jobs) = unbounded();
        let state = AppState::new(AppContext {
            config: Config::default(),
            capabilities: TerminalCapabilities::default(),
            worker_tx,
            runtime: rt.handle().clone(),
            store: Arc::new(MemoryProfileStore::new()),
            rasterizer: Rasterizer::new(),
            prefs: Preferences::default(),
            prefs_path: Some(dir.path().join("prefs.toml")),
            auth_events: None,
        });
        Harness {
            _rt: rt,
            state,
            jobs,
            _dir: dir,
        }
    }

    fn user(credits: u32) -> User {
        User::from_parts(
            "u1".into(),
            "ana@example.com".into(),
            Some("Ana Souza".into()),
            Some(Profile {
                plan: PlanTier::Free,
                credits,
            }),
        )
    }

    fn next_job(h: &Harness) -> Job {
        match h.jobs.try_recv() {
            Ok(WorkerMessage::Run(job)) => job,
            other => panic!("expected a job, got {:?}", other),
        }
    }

    fn signed_in(credits: u32) -> Harness {
        let mut h = harness();
        h.state.sign_in(user(credits));
        h.state.modal = None;
        h
    }

    fn balance(h: &Harness) -> u32 {
        h.state.ledger().unwrap().balance()
    }

    fn logo_image() -> GeneratedImage {
        GeneratedImage::from_image(image::DynamicImage::new_rgba8(8, 8)).unwrap()
    }

    #[test]
    fn test_sign_in_shows_intro_until_dismissed_for_today() {
        let mut h = harness();
        h.state.sign_in(user(3));
        assert!(matches!(h.state.modal, Some(Modal::Intro(Tool::Menu))));
        h.state.close_intro(true);
        assert!(h.state.modal.is_none());

        h.state.set_tool(Tool::Logo);
        assert!(matches!(h.state.modal, Some(Modal::Intro(Tool::Logo))));
        h.state.close_intro(false);
        h.state.set_tool(Tool::Menu);
        assert!(h.state.modal.is_none());
        h.state.set_tool(Tool::Logo);
        assert!(matches!(h.state.modal, Some(Modal::Intro(Tool::Logo))));
    }

    #[test]
    fn test_same_user_sign_in_is_idempotent() {
        let mut h = signed_in(3);
        h.state.logo_form.brand_name = "Cafe".into();
        h.state.set_tool(Tool::Logo);
        h.state.modal = None;
        h.state.trigger_generate();
        let _job = next_job(&h);
        h.state.sign_in(user(3));
        assert!(h.state.workspace.as_ref().unwrap().logo.is_busy());
    }

    #[test]
    fn test_incomplete_form_sends_nothing() {
        let mut h = signed_in(3);
        h.state.trigger_generate();
        assert!(h.jobs.try_recv().is_err());
        assert!(h.state.status.message.contains("restaurant name"));
    }

    #[test]
    fn test_logo_success_debits_once() {
        let mut h = signed_in(5);
        h.state.tool = Tool::Logo;
        h.state.logo_form.brand_name = "Burger Bros".into();
        h.state.trigger_generate();

        let ticket = match next_job(&h) {
            Job::Logo { ticket, request } => {
                assert_eq!(request.brand_name, "Burger Bros");
                ticket
            }
            other => panic!("unexpected job {:?}", other),
        };
        assert_eq!(ticket.cost(), 1);

        h.state.trigger_generate();
        assert!(h.jobs.try_recv().is_err());
        assert!(h.state.status.message.contains("already"));

        h.state.handle_worker_response(WorkerResponse::Logo {
            ticket,
            result: Ok(logo_image()),
        });
        assert_eq!(balance(&h), 4);
        assert!(h.state.workspace.as_ref().unwrap().has_artifact(Tool::Logo));
        assert_eq!(h.state.status.level, NoticeLevel::Success);
    }

    #[test]
    fn test_failure_keeps_balance_and_notifies() {
        let mut h = signed_in(5);
        h.state.tool = Tool::Logo;
        h.state.logo_form.brand_name = "Cafe".into();
        h.state.trigger_generate();
        let Job::Logo { ticket, .. } = next_job(&h) else {
            panic!("expected logo job")
        };
        h.state.handle_worker_response(WorkerResponse::Logo {
            ticket,
            result: Err(ProviderError::NoImage),
        });
        h.state.drain_signals();
        assert_eq!(balance(&h), 5);
        assert!(h.state.status.is_error());
        assert!(!h.state.workspace.as_ref().unwrap().logo.is_busy());
    }

    #[test]
    fn test_zero_balance_opens_upsell_without_job() {
        let mut h = signed_in(0);
        h.state.tool = Tool::Logo;
        h.state.logo_form.brand_name = "Cafe".into();
        h.state.trigger_generate();
        assert!(h.jobs.try_recv().is_err());
        h.state.drain_signals();
        assert!(matches!(h.state.modal, Some(Modal::Upsell { tool: Tool::Logo, cost: 1 })));
    }

    #[test]
    fn test_menu_without_credits_skips_background() {
        let mut h = signed_in(0);
        h.state.menu_form.restaurant_name = "Bella Pizza".into();
        h.state.menu_form.dishes = "Pizzas: Margherita | tomato | 39.90".into();
        h.state.trigger_generate();
        match next_job(&h) {
            Job::Menu {
                ticket,
                with_background,
                ..
            } => {
                assert!(!with_background);
                assert_eq!(ticket.cost(), 0);
                let _ = ticket;
            }
            other => panic!("unexpected job {:?}", other),
        }
    }

    #[test]
    fn test_text_tool_is_free() {
        let mut h = signed_in(0);
        h.state.tool = Tool::Pricing;
        h.state.pricing_form.product_name = "Burger".into();
        h.state.pricing_form.ingredients_cost = "10".into();
        h.state.trigger_generate();
        let Job::Pricing { ticket, input } = next_job(&h) else {
            panic!("expected pricing job")
        };
        let strategy = h
            ._rt
            .block_on(crate::tools::pricing::pricing_strategy(&OfflineProvider::new(), &input));
        h.state.handle_worker_response(WorkerResponse::Pricing { ticket, strategy });
        assert_eq!(balance(&h), 0);
        let text = h.state.clipboard_text().unwrap();
        assert!(text.contains("Ideal price"));
    }

    #[test]
    fn test_result_after_sign_out_is_dropped() {
        let mut h = signed_in(3);
        h.state.tool = Tool::Logo;
        h.state.logo_form.brand_name = "Cafe".into();
        h.state.trigger_generate();
        let Job::Logo { ticket, .. } = next_job(&h) else {
            panic!("expected logo job")
        };
        h.state.sign_out();
        h.state.handle_worker_response(WorkerResponse::Logo {
            ticket,
            result: Ok(logo_image()),
        });
        assert!(h.state.workspace.is_none());
    }

    #[test]
    fn test_result_from_previous_user_is_dropped() {
        let mut h = signed_in(3);
        h.state.tool = Tool::Logo;
        h.state.logo_form.brand_name = "Cafe".into();
        h.state.trigger_generate();
        let Job::Logo { ticket: stale, .. } = next_job(&h) else {
            panic!("expected logo job")
        };
        h.state.sign_out();
        let other = User::from_parts(
            "u2".into(),
            "bo@example.com".into(),
            Some("Bo Lima".into()),
            Some(Profile {
                plan: PlanTier::Free,
                credits: 5,
            }),
        );
        h.state.sign_in(other);
        h.state.modal = None;
        h.state.trigger_generate();
        let Job::Logo { ticket: own, .. } = next_job(&h) else {
            panic!("expected logo job")
        };

        h.state.handle_worker_response(WorkerResponse::Logo {
            ticket: stale,
            result: Ok(logo_image()),
        });
        let ws = h.state.workspace.as_ref().unwrap();
        assert_eq!(ws.user.id, "u2");
        assert_eq!(ws.ledger.balance(), 5);
        assert!(!ws.logo.result().has_artifact());
        assert!(ws.logo.is_busy());
        assert!(!h.state.status.message.contains("Logo ready"));

        h.state.handle_worker_response(WorkerResponse::Logo {
            ticket: own,
            result: Ok(logo_image()),
        });
        assert_eq!(balance(&h), 4);
        assert!(h.state.workspace.as_ref().unwrap().logo.result().has_artifact());
    }

    #[test]
    fn test_editing_after_failure_returns_to_idle() {
        let mut h = signed_in(3);
        h.state.tool = Tool::Promotion;
        h.state.promotion_form.request.product = "Pizza".into();
        h.state.trigger_generate();
        let Job::Promotion { ticket, .. } = next_job(&h) else {
            panic!("expected promotion job")
        };
        h.state.handle_worker_response(WorkerResponse::Promotion {
            ticket,
            result: Err(ProviderError::Request("timeout".into())),
        });
        h.state.drain_signals();
        assert_eq!(h.state.workspace.as_ref().unwrap().phase(Tool::Promotion), Phase::Failed);
        assert!(h.state.status.is_error());

        h.state.edit_push('!');
        assert_eq!(h.state.workspace.as_ref().unwrap().phase(Tool::Promotion), Phase::Idle);
        assert!(!h.state.status.is_error());
    }

    #[test]
    fn test_brand_identity_round_trip() {
        let mut h = signed_in(0);
        h.state.set_tool(Tool::Brand);
        h.state.modal = None;
        h.state.trigger_generate();
        assert!(h.jobs.try_recv().is_err());

        h.state.brand_form.request.brand_name = "Sol".into();
        h.state.brand_form.request.industry = "Bakery".into();
        h.state.trigger_generate();
        let Job::Brand { ticket, request } = next_job(&h) else {
            panic!("expected brand job")
        };
        assert_eq!(request.industry, "Bakery");
        let identity = BrandIdentity {
            slogans: vec!["Bread with sunshine".into()],
            ..BrandIdentity::default()
        };
        h.state.handle_worker_response(WorkerResponse::Brand {
            ticket,
            result: Ok(identity),
        });
        assert_eq!(balance(&h), 0);
        assert_eq!(h.state.status.message, "Brand identity ready.");
        assert_eq!(h.state.clipboard_text().unwrap(), "Slogans\n- Bread with sunshine");
    }

    #[test]
    fn test_missing_font_is_reported_at_start() {
        let h = harness();
        assert!(h.state.status.is_error());
        assert!(h.state.status.message.contains("export.font_path"));
    }

    #[test]
    fn test_auth_validation_is_inline() {
        let mut h = harness();
        h.state.auth_form.email = "not-an-email".into();
        h.state.submit_auth();
        assert!(h.state.auth_form.error.is_some());
        assert!(h.jobs.try_recv().is_err());

        h.state.handle_worker_response(WorkerResponse::Auth(Err(crate::session::AuthError::Rejected(
            "Invalid login credentials".into(),
        ))));
        assert_eq!(h.state.auth_form.error.as_deref(), Some("Invalid login credentials"));
    }

    #[test]
    fn test_registered_switches_to_login() {
        let mut h = harness();
        h.state.auth_form.toggle_mode();
        h.state.auth_form.email = "ana@example.com".into();
        h.state.handle_worker_response(WorkerResponse::Auth(Ok(AuthOutcome::Registered)));
        assert_eq!(h.state.auth_form.mode, AuthMode::Login);
        assert_eq!(h.state.auth_form.email, "ana@example.com");
    }

    #[test]
    fn test_checkout_credits_on_return() {
        let mut h = signed_in(1);
        h.state.start_checkout(PurchaseItem::Pack("pack_10".into()));
        h.state.submit_checkout();
        assert!(matches!(&h.state.modal, Some(Modal::Checkout(c)) if c.error.is_some()));
        assert!(h.jobs.try_recv().is_err());

        if let Some(Modal::Checkout(c)) = h.state.modal.as_mut() {
            c.form.tax_id = "123".into();
            c.form.cellphone = "555".into();
        }
        h.state.submit_checkout();
        let Job::Checkout { item, .. } = next_job(&h) else {
            panic!("expected checkout job")
        };
        h.state.handle_worker_response(WorkerResponse::Checkout {
            item,
            result: Ok("http://localhost/?payment_status=success&session_id=mock_session_1".into()),
        });
        assert_eq!(balance(&h), 11);
        assert!(h.state.prefs.pending_purchase.is_none());
        assert!(h.state.modal.is_none());
    }

    #[test]
    fn test_checkout_error_stays_on_form() {
        let mut h = signed_in(1);
        h.state.start_checkout(PurchaseItem::Plan(PlanTier::Pro));
        h.state.handle_worker_response(WorkerResponse::Checkout {
            item: PurchaseItem::Plan(PlanTier::Pro),
            result: Err(crate::billing::PaymentError::Gateway("declined".into())),
        });
        assert!(matches!(&h.state.modal, Some(Modal::Checkout(c)) if c.error.is_some() && !c.submitting));
        assert_eq!(balance(&h), 1);
    }

    #[test]
    fn test_payment_return_waits_for_sign_in() {
        let mut h = harness();
        h.state.prefs.pending_purchase = Some(PurchaseItem::Plan(PlanTier::Pro));
        assert!(h.state.handle_payment_return("http://localhost/?payment_status=success"));
        assert!(!h.state.handle_payment_return("http://localhost/?payment_status=failed"));
        h.state.sign_in(user(3));
        assert_eq!(balance(&h), 53);
        assert_eq!(h.state.ledger().unwrap().plan(), PlanTier::Pro);
    }

    #[test]
    fn test_adjustments_clamp_and_reset() {
        let mut h = signed_in(3);
        h.state.tool = Tool::Logo;
        h.state.workspace.as_mut().unwrap().logo.result_mut().set_artifact(logo_image());
        for _ in 0..100 {
            h.state.adjust(AdjustAction::Shrink);
        }
        let ws = h.state.workspace.as_ref().unwrap();
        assert!((ws.logo.result().adjustments().scale - 0.1).abs() < 1e-6);

        h.state.adjust(AdjustAction::NextOverlay);
        h.state.adjust(AdjustAction::NextOverlay);
        let overlay = h.state.workspace.as_ref().unwrap().logo.result().adjustments().overlay;
        assert_eq!(overlay, OverlayMode::Neutral.next().next());

        h.state.adjust(AdjustAction::Reset);
        assert_eq!(h.state.workspace.as_ref().unwrap().logo.result().adjustments().scale, 1.0);
    }

    #[test]
    fn test_menu_section_targets() {
        let mut h = signed_in(3);
        let request = h.state.menu_form.request(None);
        let design = crate::tools::menu::fallback_design(&request);
        h.state.workspace.as_mut().unwrap().menu.result_mut().set_artifact(design);

        h.state.cycle_adjust_target();
        assert_eq!(h.state.adjust_target, AdjustTarget::Title);
        h.state.adjust(AdjustAction::Grow);
        h.state.adjust(AdjustAction::Move { dx: 0.0, dy: 1.0 });
        for _ in 0..20 {
            h.state.adjust(AdjustAction::RotateRight);
        }
        let adj = *h.state.workspace.as_ref().unwrap().menu.result().adjustments();
        assert!((adj.title.scale - 1.05).abs() < 1e-6);
        assert_eq!(adj.title.offset_y, OFFSET_STEP);
        assert_eq!(adj.rotation, 5.0);
    }

    #[test]
    fn test_preview_is_cached_until_change() {
        let mut h = signed_in(3);
        h.state.tool = Tool::Logo;
        assert!(h.state.preview_lines(20, 10).is_none());
        h.state.workspace.as_mut().unwrap().logo.result_mut().set_artifact(logo_image());
        h.state.bump_preview();
        let rows = h.state.preview_lines(20, 10).map(|l| l.len()).unwrap_or(0);
        assert!(rows > 0 && rows <= 10);
        let first = h.state.preview_cache.as_ref().unwrap().key;
        let _ = h.state.preview_lines(20, 10);
        assert_eq!(h.state.preview_cache.as_ref().unwrap().key, first);
        h.state.adjust(AdjustAction::Grow);
        let _ = h.state.preview_lines(20, 10);
        assert_ne!(h.state.preview_cache.as_ref().unwrap().key, first);
    }

    #[test]
    fn test_settings_navigation_and_editing() {
        let mut h = signed_in(3);
        h.state.prev_setting();
        assert_eq!(h.state.current_selected_setting(), 5);
        h.state.next_setting();
        assert_eq!(h.state.current_selected_setting(), 0);
        assert!(h.state.start_editing());
        for c in "Cafe".chars() {
            h.state.edit_push(c);
        }
        h.state.edit_pop();
        assert_eq!(h.state.menu_form.restaurant_name, "Caf");
        h.state.next_setting();
        assert!(!h.state.start_editing());
        assert!(h.state.cycle_setting(true));
    }

    #[test]
    fn test_store_lists_paid_plans_then_packs() {
        let items = store_items();
        assert_eq!(items.len(), 7);
        assert_eq!(items[0], PurchaseItem::Plan(PlanTier::Pro));
        assert_eq!(items[2], PurchaseItem::Pack("test_1".into()));
    }

    #[test]
    fn test_menu_text_refresh_needs_a_menu() {
        let mut h = signed_in(3);
        h.state.trigger_text_refresh();
        assert!(h.jobs.try_recv().is_err());
        assert!(h.state.status.message.contains("Generate a menu"));
    }
}
