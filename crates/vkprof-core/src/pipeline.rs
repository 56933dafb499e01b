//! Registry of live pipelines created through the layer.

use ash::vk;
use dashmap::DashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineInfo {
    pub bind_point: vk::PipelineBindPoint,
    pub stage_count: u32,
}

#[derive(Default)]
pub struct PipelineRegistry {
    pipelines: DashMap<vk::Pipeline, PipelineInfo>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register created pipelines. Null entries (pipelines the driver
    /// declined to create) are skipped.
    pub fn register(&self, bind_point: vk::PipelineBindPoint, pipelines: &[(vk::Pipeline, u32)]) {
        for &(pipeline, stage_count) in pipelines {
            if pipeline != vk::Pipeline::null() {
                self.pipelines.insert(pipeline, PipelineInfo { bind_point, stage_count });
            }
        }
    }

    pub fn unregister(&self, pipeline: vk::Pipeline) -> Option<PipelineInfo> {
        self.pipelines.remove(&pipeline).map(|(_, info)| info)
    }

    pub fn get(&self, pipeline: vk::Pipeline) -> Option<PipelineInfo> {
        self.pipelines.get(&pipeline).map(|v| *v)
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}
