use std::sync::Arc;

type LensChangeFn = Arc<dyn Fn(&str) + Send + Sync>;
type ImageCapturedFn = Arc<dyn Fn(&str) + Send + Sync>;
type ShowPreviewFn = Arc<dyn Fn() -> bool + Send + Sync>;

/// Caller hooks invoked while a session runs.
///
/// Every hook is optional; unset hooks are no-ops and the default preview
/// is shown unless a hook says otherwise.
#[derive(Clone, Default)]
pub struct CameraListener {
    on_lens_change: Option<LensChangeFn>,
    on_image_captured: Option<ImageCapturedFn>,
    should_show_default_preview: Option<ShowPreviewFn>,
}

impl CameraListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with the lens id whenever the carousel activates a lens
    pub fn on_lens_change<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_lens_change = Some(Arc::new(f));
        self
    }

    /// Called with the image uri once a photo is taken
    pub fn on_image_captured<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_image_captured = Some(Arc::new(f));
        self
    }

    pub fn should_show_default_preview<F>(mut self, f: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.should_show_default_preview = Some(Arc::new(f));
        self
    }

    pub(crate) fn notify_lens_change(&self, lens_id: &str) {
        if let Some(f) = &self.on_lens_change {
            f(lens_id);
        }
    }

    pub(crate) fn notify_image_captured(&self, uri: &str) {
        if let Some(f) = &self.on_image_captured {
            f(uri);
        }
    }

    pub(crate) fn shows_default_preview(&self) -> bool {
        self.should_show_default_preview
            .as_ref()
            .map_or(true, |f| f())
    }
}

impl std::fmt::Debug for CameraListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraListener")
            .field("on_lens_change", &self.on_lens_change.is_some())
            .field("on_image_captured", &self.on_image_captured.is_some())
            .field(
                "should_show_default_preview",
                &self.should_show_default_preview.is_some(),
            )
            .finish()
    }
}
