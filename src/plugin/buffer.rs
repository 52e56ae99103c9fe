//! 툴박스 핸들의 스코프 가드
//!
//! 핸들은 가드가 소유하며, 가드가 사라지면 오류 경로를 포함해 항상 삭제된다.

use crate::astra::{AlgorithmConfig, AlgorithmId, AstraContext, DataGeometry, DataId};
use crate::error::{AstraError, Result};
use log::{debug, warn};
use ndarray::{Array3, ArrayD, IxDyn};

/// 툴박스가 할당한 데이터 객체
pub(crate) struct DataHandle<'c> {
    context: &'c AstraContext,
    id: DataId,
    live: bool,
}

impl<'c> DataHandle<'c> {
    pub(crate) fn create(
        context: &'c AstraContext,
        geometry: &DataGeometry,
        init: Option<Array3<f32>>,
    ) -> Result<Self> {
        let created = context.toolbox().data3d_create(geometry, init);
        let id = created?;
        debug!("created {:?} buffer {}", geometry.kind(), id);
        Ok(Self {
            context,
            id,
            live: true,
        })
    }

    pub(crate) fn id(&self) -> DataId {
        self.id
    }

    /// 핸들을 삭제하면서 저장소를 복사 없이 넘겨받는다
    pub(crate) fn into_array(mut self) -> Result<Array3<f32>> {
        self.live = false;
        let released = self.context.toolbox().data3d_release(self.id);
        debug!("released buffer {}", self.id);
        released
    }
}

impl Drop for DataHandle<'_> {
    fn drop(&mut self) {
        if !self.live {
            return;
        }
        let deleted = self.context.toolbox().data3d_delete(self.id);
        match deleted {
            Ok(()) => debug!("deleted buffer {}", self.id),
            Err(e) => warn!("failed to delete buffer {}: {}", self.id, e),
        }
    }
}

/// 생성된 알고리즘 객체
pub(crate) struct AlgorithmHandle<'c> {
    context: &'c AstraContext,
    id: AlgorithmId,
    name: &'static str,
}

impl<'c> AlgorithmHandle<'c> {
    pub(crate) fn create(context: &'c AstraContext, config: AlgorithmConfig) -> Result<Self> {
        let created = context.toolbox().algorithm_create(config);
        let id = created?;
        Ok(Self {
            context,
            id,
            name: config.kind.name(),
        })
    }

    pub(crate) fn run(&self, iterations: u32) -> Result<()> {
        debug!("running {} ({})", self.name, self.id);
        self.context.toolbox().algorithm_run(self.id, iterations)
    }
}

impl Drop for AlgorithmHandle<'_> {
    fn drop(&mut self) {
        let deleted = self.context.toolbox().algorithm_delete(self.id);
        if let Err(e) = deleted {
            warn!("failed to delete {} {}: {}", self.name, self.id, e);
        }
    }
}

/// 호출자 저장소에 연결된 데이터 객체. 사라질 때 저장소를 원래 자리로 돌려놓는다
struct LinkedHandle<'c, 's> {
    context: &'c AstraContext,
    id: Option<DataId>,
    slot: &'s mut ArrayD<f32>,
    shape: IxDyn,
}

impl LinkedHandle<'_, '_> {
    /// 저장소를 툴박스에서 떼어 원래 형상으로 되돌린다.
    /// 되찾지 못하면 자리는 원래 형상의 0 배열이 된다
    fn restore(&mut self) -> Result<()> {
        let Some(id) = self.id.take() else {
            return Ok(());
        };
        let released = self.context.toolbox().data3d_release(id);
        let restored = released.and_then(|storage| {
            storage.into_shape(self.shape.clone()).map_err(|e| {
                AstraError::GeometryMismatch(format!("linked buffer {} came back with another layout: {}", id, e))
            })
        });
        match restored {
            Ok(storage) => {
                *self.slot = storage;
                debug!("unlinked buffer {}", id);
                Ok(())
            }
            Err(e) => {
                *self.slot = ArrayD::zeros(self.shape.clone());
                Err(e)
            }
        }
    }
}

impl Drop for LinkedHandle<'_, '_> {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            warn!("failed to unlink buffer: {}", e);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LinkOutcome {
    Linked,
    /// 링크할 수 없어 저장소를 건드리지 않았다
    Unavailable,
}

/// `slot`의 저장소를 툴박스에 연결한 채로 `body`를 실행
///
/// 저장소는 (a, b, c) 형상으로 넘어갔다가 원래 형상으로 되돌아온다.
/// 표준 레이아웃이 아니거나 툴박스가 거부하면 `Unavailable`.
pub(crate) fn with_linked<F>(
    context: &AstraContext,
    geometry: &DataGeometry,
    slot: &mut ArrayD<f32>,
    body: F,
) -> Result<LinkOutcome>
where
    F: FnOnce(DataId) -> Result<()>,
{
    let (a, b, c) = geometry.shape();
    if slot.len() != a * b * c {
        return Err(AstraError::GeometryMismatch(format!(
            "output storage of shape {:?} cannot hold {:?}",
            slot.shape(),
            (a, b, c)
        )));
    }
    if !slot.is_standard_layout() {
        return Ok(LinkOutcome::Unavailable);
    }
    let shape = slot.raw_dim();
    let storage = std::mem::replace(slot, ArrayD::zeros(IxDyn(&[0])));
    let storage = match storage.into_shape((a, b, c)) {
        Ok(storage) => storage,
        Err(e) => {
            *slot = ArrayD::zeros(shape);
            return Err(AstraError::GeometryMismatch(e.to_string()));
        }
    };

    let linked = context.toolbox().data3d_link(geometry, storage);
    let id = match linked {
        Ok(id) => id,
        Err((e, storage)) => {
            debug!("link refused ({}), falling back to copy", e);
            match storage.into_shape(shape.clone()) {
                Ok(restored) => *slot = restored,
                Err(e) => {
                    warn!("refused storage came back with another layout: {}", e);
                    *slot = ArrayD::zeros(shape);
                }
            }
            return Ok(LinkOutcome::Unavailable);
        }
    };
    debug!("linked caller storage as {}", id);

    let mut guard = LinkedHandle {
        context,
        id: Some(id),
        slot,
        shape,
    };
    let result = body(id);
    let restored = guard.restore();
    drop(guard);
    result?;
    restored?;
    Ok(LinkOutcome::Linked)
}
