//! Per-connection session: applies client frames to the state machine

use super::state::{SessionConfig, SessionState};
use crate::codec::{CodecError, DecodeLimits, decode_data_url, decode_image_data_url};
use crate::error::SegmentError;
use crate::mask::{AnnotationPatch, BoundsError, Mask, project_data_url};
use crate::protocol::{ActionEvent, ClientMessage, ImageEvent, SelectionEvent, ServerMessage};
use crate::solver::SolverPool;
use image::{DynamicImage, RgbImage};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// One connection's image and mask
///
/// Owned by the connection task; never shared between connections.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    state: SessionState,
    config: SessionConfig,
}

impl Session {
    pub fn new(id: Uuid, config: SessionConfig) -> Self {
        Self {
            id,
            state: SessionState::Empty,
            config,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Apply one frame's events in order: image, selection, action.
    ///
    /// The frame is all-or-nothing: on error the session keeps the state it
    /// had before the frame and no results are returned.
    pub async fn handle_message(
        &mut self,
        message: ClientMessage,
        solver: &SolverPool,
    ) -> Result<Vec<ServerMessage>, SegmentError> {
        let mut staged = self.state.clone();
        let mut responses = Vec::new();

        if let Some(event) = message.image {
            staged = self.apply_image(staged, event)?;
        }

        if let Some(event) = message.selection {
            let (next, response) = self.apply_selection(staged, event, solver).await?;
            staged = next;
            responses.push(response);
        }

        if let Some(event) = message.action {
            let (next, response) = self.apply_action(staged, event, solver).await?;
            staged = next;
            responses.push(response);
        }

        if staged.name() != self.state.name() {
            info!(
                "Session {}: {} -> {}",
                self.id,
                self.state.name(),
                staged.name()
            );
        }
        self.state = staged;
        Ok(responses)
    }

    fn limits(&self) -> DecodeLimits {
        DecodeLimits {
            max_dimension: self.config.max_image_dimension,
            max_pixels: self.config.max_image_pixels,
        }
    }

    fn apply_image(
        &self,
        state: SessionState,
        event: ImageEvent,
    ) -> Result<SessionState, SegmentError> {
        let rgba = decode_data_url(&event.data_url, self.limits())?;
        // Segmentation works on colour only
        let image: RgbImage = DynamicImage::ImageRgba8(rgba).into_rgb8();
        debug!(
            "Session {}: loaded {}x{} image",
            self.id,
            image.width(),
            image.height()
        );
        Ok(state.load_image(Arc::new(image)))
    }

    async fn apply_selection(
        &self,
        state: SessionState,
        event: SelectionEvent,
        solver: &SolverPool,
    ) -> Result<(SessionState, ServerMessage), SegmentError> {
        let image = state.require_image()?.clone();
        let (width, height) = image.dimensions();

        let rect = event.rect.clip_to(width, height);
        if rect.is_empty() {
            return Err(BoundsError {
                left: event.rect.left as i64,
                top: event.rect.top as i64,
                width: event.rect.width,
                height: event.rect.height,
                bound_width: width,
                bound_height: height,
            }
            .into());
        }
        debug!("Session {}: initializing from {:?}", self.id, rect);

        let mask = solver.init_with_rect(image, rect).await?;
        let response = result_message(&mask)?;
        Ok((state.initialize(mask)?, response))
    }

    async fn apply_action(
        &self,
        state: SessionState,
        event: ActionEvent,
        solver: &SolverPool,
    ) -> Result<(SessionState, ServerMessage), SegmentError> {
        let (image, mask) = state.require_mask()?;
        let (image, mask) = (image.clone(), mask.clone());

        let stroke = decode_image_data_url(&event.path, self.limits())?;
        let patch = AnnotationPatch::from_stroke(&stroke).ok_or(CodecError::MissingAlpha)?;
        let composited = mask.composite(&patch, event.offset, event.kind.label())?;
        debug!(
            "Session {}: {} stroke {}x{} at ({}, {}), {} cells touched",
            self.id,
            event.kind.as_str(),
            patch.width(),
            patch.height(),
            event.offset.left,
            event.offset.top,
            patch.touched_count()
        );

        let refined = solver.refine_with_mask(image, Arc::new(composited)).await?;
        let response = result_message(&refined)?;
        Ok((state.refine(refined)?, response))
    }
}

fn result_message(mask: &Mask) -> Result<ServerMessage, SegmentError> {
    Ok(ServerMessage::Mask {
        data_url: project_data_url(mask)?,
    })
}
