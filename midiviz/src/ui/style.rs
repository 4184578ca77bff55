use dark_light::Mode;

/// Follows the OS light/dark preference.
pub fn apply(ctx: &egui::Context) {
    ctx.set_visuals(visuals_for(dark_light::detect()));
    ctx.style_mut(|style| {
        style.spacing.item_spacing = egui::vec2(8.0, 6.0);
        style.spacing.slider_width = 160.0;
    });
}

pub fn visuals_for(mode: Mode) -> egui::Visuals {
    let mut visuals = match mode {
        Mode::Light => egui::Visuals::light(),
        Mode::Dark | Mode::Default => egui::Visuals::dark(),
    };
    visuals.window_fill = visuals.window_fill.gamma_multiply(0.92);
    visuals
}
