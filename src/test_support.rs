//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::assets::{Asset, AssetError, AssetLoader, BundleLoader};
use crate::core::config::NavigatorSettings;
use crate::core::{
    HookError, HookKind, HookResult, Lifecycle, Navigator, Presenter, View, ViewError,
};
use crate::transition::{TransitionPlayer, TransitionTiming, TransitionTarget};

// ============================================================================
// Hook journal
// ============================================================================

/// Shared, ordered record of hook invocations, e.g. `"activate Screens/Main"`.
#[derive(Debug, Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    /// Exact-match count.
    pub fn count(&self, entry: &str) -> usize {
        self.0.borrow().iter().filter(|e| *e == entry).count()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.0.borrow().iter().position(|e| e == entry)
    }
}

// ============================================================================
// Test presenters
// ============================================================================

#[derive(Debug, Default)]
pub struct TestModel {
    pub journal: Journal,
    /// Hook that returns an error.
    pub fail_on: Option<HookKind>,
    /// Hook that calls `request_close`.
    pub close_from: Option<HookKind>,
    pub value: u32,
}

impl TestModel {
    pub fn with_journal(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            ..Default::default()
        }
    }

    pub fn failing(journal: &Journal, hook: HookKind) -> Self {
        Self {
            fail_on: Some(hook),
            ..Self::with_journal(journal)
        }
    }

    pub fn closing_from(journal: &Journal, hook: HookKind) -> Self {
        Self {
            close_from: Some(hook),
            ..Self::with_journal(journal)
        }
    }
}

#[derive(Debug)]
pub struct TestView {
    pub path: String,
    pub title: String,
}

impl TestView {
    pub fn named(path: &str) -> Self {
        Self {
            path: path.to_string(),
            title: path.to_string(),
        }
    }
}

impl View for TestView {
    fn instantiate(asset: &Asset) -> Result<Self, ViewError> {
        if asset.contents.contains("corrupt") {
            return Err(ViewError::new("corrupt view data"));
        }
        Ok(Self {
            path: asset.path.clone(),
            title: asset.contents.lines().next().unwrap_or_default().to_string(),
        })
    }
}

/// A view that lives in the scene from the start.
#[derive(Debug)]
pub struct HudView {
    pub label: String,
}

impl HudView {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
        }
    }
}

impl View for HudView {
    const PREPLACED: bool = true;

    fn instantiate(_asset: &Asset) -> Result<Self, ViewError> {
        Err(ViewError::new("the HUD is placed in the scene, not loaded"))
    }
}

fn probe<P>(cx: &mut Lifecycle<'_, P>, hook: HookKind) -> HookResult
where
    P: Presenter<Model = TestModel>,
{
    cx.model.journal.record(format!("{} {}", hook, P::PATH));
    if cx.model.close_from == Some(hook) {
        cx.request_close();
    }
    if cx.model.fail_on == Some(hook) {
        return Err(HookError::new(format!("{hook} refused by test model")));
    }
    Ok(())
}

macro_rules! test_presenter {
    ($name:ident, $path:literal) => {
        test_presenter!($name, $path, TestView);
    };
    ($name:ident, $path:literal, $view:ty) => {
        #[derive(Debug, Default)]
        pub struct $name;

        impl Presenter for $name {
            type View = $view;
            type Model = TestModel;
            const PATH: &'static str = $path;

            fn on_construct(&mut self, cx: &mut Lifecycle<'_, Self>) -> HookResult {
                probe(cx, HookKind::Construct)
            }

            fn on_activate(&mut self, cx: &mut Lifecycle<'_, Self>) -> HookResult {
                probe(cx, HookKind::Activate)
            }

            fn on_deactivate(&mut self, cx: &mut Lifecycle<'_, Self>) -> HookResult {
                probe(cx, HookKind::Deactivate)
            }

            fn on_destroy(&mut self, cx: &mut Lifecycle<'_, Self>) -> HookResult {
                probe(cx, HookKind::Destroy)
            }
        }
    };
}

test_presenter!(MainScreen, "Screens/Main");
test_presenter!(GameScreen, "Screens/Game");
test_presenter!(ShopScreen, "Screens/Shop");
test_presenter!(HudScreen, "Screens/Hud", HudView);
test_presenter!(SettingsPopup, "Popups/Settings");
test_presenter!(ConfirmPopup, "Popups/Confirm");
test_presenter!(ToastPopup, "Popups/Toast");
test_presenter!(MissingPopup, "Popups/Missing");
test_presenter!(CorruptPopup, "Popups/Corrupt");

// ============================================================================
// Gates
// ============================================================================

/// Holds async test doubles at a suspension point until opened.
#[derive(Clone)]
pub struct Gate {
    open: Rc<watch::Sender<bool>>,
}

impl Gate {
    pub fn closed() -> Self {
        let (open, _) = watch::channel(false);
        Self {
            open: Rc::new(open),
        }
    }

    pub fn open(&self) {
        self.open.send_replace(true);
    }

    pub async fn wait(&self) {
        let mut rx = self.open.subscribe();
        let _ = rx.wait_for(|open| *open).await;
    }
}

/// A gate slot shared between a test and its double. Cloned out before
/// awaiting so no `RefCell` borrow is held across the suspension.
#[derive(Clone, Default)]
struct Hold(Rc<RefCell<Option<Gate>>>);

impl Hold {
    fn set(&self, gate: &Gate) {
        *self.0.borrow_mut() = Some(gate.clone());
    }

    async fn pass(&self) {
        let gate = self.0.borrow().clone();
        if let Some(gate) = gate {
            gate.wait().await;
        }
    }
}

// ============================================================================
// Recording loader
// ============================================================================

/// Observes what a [`ProbedLoader`] handed out and got back.
#[derive(Clone, Default)]
pub struct LoaderProbe {
    loads: Rc<RefCell<Vec<String>>>,
    releases: Rc<RefCell<Vec<String>>>,
    hold: Hold,
}

impl LoaderProbe {
    /// Suspends every subsequent load until `gate` opens.
    pub fn hold(&self, gate: &Gate) {
        self.hold.set(gate);
    }

    pub fn load_count(&self) -> usize {
        self.loads.borrow().len()
    }

    pub fn loads_of(&self, path: &str) -> usize {
        self.loads.borrow().iter().filter(|p| *p == path).count()
    }

    /// Assets loaded and not yet released.
    pub fn outstanding(&self) -> usize {
        self.loads.borrow().len() - self.releases.borrow().len()
    }
}

/// Serves the test bundle and records every successful load and release.
pub struct ProbedLoader {
    inner: BundleLoader,
    probe: LoaderProbe,
}

#[async_trait(?Send)]
impl AssetLoader for ProbedLoader {
    fn name(&self) -> &str {
        "probed"
    }

    async fn load(&self, path: &str) -> Result<Asset, AssetError> {
        self.probe.hold.pass().await;
        let asset = self.inner.load(path).await?;
        self.probe.loads.borrow_mut().push(asset.path.clone());
        Ok(asset)
    }

    fn release(&self, asset: &Asset) {
        self.probe.releases.borrow_mut().push(asset.path.clone());
    }
}

pub fn test_bundle() -> BundleLoader {
    BundleLoader::from_entries([
        ("Screens/Main", "title = \"Main menu\""),
        ("Screens/Game", "title = \"Game\""),
        ("Screens/Shop", "title = \"Shop\""),
        ("Popups/Settings", "title = \"Settings\""),
        ("Popups/Confirm", "title = \"Are you sure?\""),
        ("Popups/Toast", "title = \"Saved\""),
        ("Popups/Corrupt", "corrupt"),
    ])
}

// ============================================================================
// Recording transitions
// ============================================================================

/// Observes what a [`RecordingTransitions`] was asked to play.
#[derive(Clone, Default)]
pub struct TransitionProbe {
    played: Rc<RefCell<Vec<String>>>,
    hold: Hold,
}

impl TransitionProbe {
    /// Suspends every subsequent transition until `gate` opens.
    pub fn hold(&self, gate: &Gate) {
        self.hold.set(gate);
    }

    pub fn entries(&self) -> Vec<String> {
        self.played.borrow().clone()
    }
}

pub struct RecordingTransitions {
    probe: TransitionProbe,
}

#[async_trait(?Send)]
impl TransitionPlayer for RecordingTransitions {
    fn name(&self) -> &str {
        "recording"
    }

    async fn play_open(&self, target: TransitionTarget<'_>) {
        self.probe
            .played
            .borrow_mut()
            .push(format!("open {}", target.path));
        self.probe.hold.pass().await;
    }

    async fn play_close(&self, target: TransitionTarget<'_>) {
        self.probe
            .played
            .borrow_mut()
            .push(format!("close {}", target.path));
        self.probe.hold.pass().await;
    }
}

// ============================================================================
// Harness
// ============================================================================

/// A navigator wired to probed doubles.
pub struct Harness {
    pub navigator: Navigator,
    pub journal: Journal,
    pub loader: LoaderProbe,
    pub transitions: TransitionProbe,
}

impl Harness {
    /// A fresh model that records into this harness's journal.
    pub fn model(&self) -> Option<TestModel> {
        Some(TestModel::with_journal(&self.journal))
    }
}

pub fn harness() -> Harness {
    harness_with(NavigatorSettings::default())
}

pub fn harness_with(settings: NavigatorSettings) -> Harness {
    let loader = LoaderProbe::default();
    let transitions = TransitionProbe::default();
    let navigator = Navigator::new(
        Box::new(ProbedLoader {
            inner: test_bundle(),
            probe: loader.clone(),
        }),
        Box::new(RecordingTransitions {
            probe: transitions.clone(),
        }),
        settings,
    );
    Harness {
        navigator,
        journal: Journal::default(),
        loader,
        transitions,
    }
}

/// Settings with a short transition configured for each of `paths`.
pub fn animated(paths: &[&str]) -> NavigatorSettings {
    let transitions: HashMap<String, TransitionTiming> = paths
        .iter()
        .map(|path| (path.to_string(), TransitionTiming::from_millis(10, 10)))
        .collect();
    NavigatorSettings {
        transitions,
        ..Default::default()
    }
}
