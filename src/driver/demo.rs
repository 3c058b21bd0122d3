//! Demo presenters driven by navigation scripts.
//!
//! Views are "cards" read from TOML assets (`title`, optional `body`). The HUD
//! is the exception: it is placed in the scene up front and never loaded.

use log::info;
use serde::Deserialize;

use crate::assets::Asset;
use crate::core::{HookResult, Lifecycle, Navigator, Presenter, View, ViewError};

#[derive(Debug, Clone, Deserialize)]
pub struct Card {
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
}

impl View for Card {
    fn instantiate(asset: &Asset) -> Result<Self, ViewError> {
        toml::from_str(&asset.contents).map_err(|e| ViewError::new(e.to_string()))
    }
}

#[derive(Debug)]
pub struct HudOverlay {
    pub label: String,
}

impl View for HudOverlay {
    const PREPLACED: bool = true;

    fn instantiate(_asset: &Asset) -> Result<Self, ViewError> {
        Err(ViewError::new("the HUD overlay is part of the scene"))
    }
}

/// Puts the views that exist from startup into the navigator's scene.
pub fn place_scene(navigator: &Navigator) {
    navigator.place_in_scene(HudOverlay {
        label: "HUD".to_string(),
    });
}

/// How many times a presenter has been shown.
#[derive(Debug, Default)]
pub struct Visits {
    pub count: u32,
}

#[derive(Default)]
pub struct MainMenu;

impl Presenter for MainMenu {
    type View = Card;
    type Model = Visits;
    const PATH: &'static str = "Screens/Main";

    fn on_activate(&mut self, cx: &mut Lifecycle<'_, Self>) -> HookResult {
        cx.model.count += 1;
        info!("{} shown ({} times)", cx.view.title, cx.model.count);
        Ok(())
    }
}

#[derive(Default)]
pub struct Game;

impl Presenter for Game {
    type View = Card;
    type Model = Visits;
    const PATH: &'static str = "Screens/Game";

    fn on_activate(&mut self, cx: &mut Lifecycle<'_, Self>) -> HookResult {
        cx.model.count += 1;
        Ok(())
    }

    fn on_destroy(&mut self, cx: &mut Lifecycle<'_, Self>) -> HookResult {
        info!("Game over after {} visits", cx.model.count);
        Ok(())
    }
}

#[derive(Default)]
pub struct Hud;

impl Presenter for Hud {
    type View = HudOverlay;
    type Model = ();
    const PATH: &'static str = "Screens/Hud";
}

#[derive(Default)]
pub struct Settings;

impl Presenter for Settings {
    type View = Card;
    type Model = ();
    const PATH: &'static str = "Popups/Settings";
}

#[derive(Default)]
pub struct Confirm;

impl Presenter for Confirm {
    type View = Card;
    type Model = ();
    const PATH: &'static str = "Popups/Confirm";
}

/// Dismisses itself as soon as it is shown.
#[derive(Default)]
pub struct Toast;

impl Presenter for Toast {
    type View = Card;
    type Model = ();
    const PATH: &'static str = "Popups/Toast";

    fn on_activate(&mut self, cx: &mut Lifecycle<'_, Self>) -> HookResult {
        info!("Toast: {}", cx.view.body.as_deref().unwrap_or(&cx.view.title));
        cx.request_close();
        Ok(())
    }
}
