use async_trait::async_trait;
use std::path::PathBuf;

use super::{steps, PackageContext, PackageVariant, StateMachine, Transition};
use crate::error::Result;
use crate::model::{MediaPackage, PackageType};

/// Bare mp4 package, published as is through the shared steps only
pub struct VideoPackage {
    state_machine: StateMachine,
    transitions: Vec<Transition>,
}

impl VideoPackage {
    pub fn new() -> Self {
        let state_machine = StateMachine::base();
        let transitions = state_machine.transition_names();
        Self {
            state_machine,
            transitions,
        }
    }
}

impl Default for VideoPackage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PackageVariant for VideoPackage {
    fn package_type(&self) -> PackageType {
        PackageType::Mp4
    }

    fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    fn state_machine(&self) -> &StateMachine {
        &self.state_machine
    }

    fn media_file_path(&self, context: &PackageContext, media: &MediaPackage) -> Result<PathBuf> {
        Ok(context.working_copy_path(media))
    }

    async fn execute(
        &self,
        transition: Transition,
        context: &PackageContext,
        media: &mut MediaPackage,
    ) -> Result<()> {
        if transition == Transition::Init && media.metadata.filename.is_none() {
            media.metadata.filename = media.original_file_name.clone();
        }
        steps::run(self, transition, context, media).await
    }
}
