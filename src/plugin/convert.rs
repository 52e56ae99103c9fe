//! 프레임워크 지오메트리 -> 툴박스 벡터형 기술자
//!
//! 항상 벡터 규약(투영별 광선/검출기 벡터)으로 변환한다. 스칼라 규약은
//! 검출기 오프셋과 회전축 이동을 표현하지 못한다.
//!
//! 기준 자세(각도 0)에서 평행빔 광선은 -y 방향, 검출기 u축은 +x, v축은 +z.
//! 콘빔 선원은 (0, -dso, 0), 검출기 중심은 (0, dcd, 0). 각 투영은 이
//! 기준 자세를 z축 기준으로 θ만큼 회전한 것이다.

use crate::astra::{ProjectionGeometry3D, ProjectionKind, ProjectionVector, ProjectorDescriptor, VolumeGeometry3D};
use crate::error::{AstraError, Result};
use crate::framework::{AcquisitionGeometry, BeamGeometry, ImageGeometry};
use log::debug;
use nalgebra::{Rotation3, Vector3};

/// (ImageGeometry, AcquisitionGeometry) -> (볼륨 기술자, 투영 기술자)
///
/// 2D 지오메트리는 슬라이스 1장짜리 3D로 변환된다. 채널 축은 다루지 않는다
/// (다채널은 채널별로 같은 기술자를 재사용).
pub fn convert_geometry_to_astra_vec(
    volume_geometry: &ImageGeometry,
    sinogram_geometry: &AcquisitionGeometry,
) -> Result<ProjectorDescriptor> {
    let dim = volume_geometry.spatial_ndim();
    if dim != sinogram_geometry.spatial_ndim() {
        return Err(AstraError::UnsupportedGeometry(format!(
            "image geometry is {}D but acquisition geometry is {}D",
            dim,
            sinogram_geometry.spatial_ndim()
        )));
    }
    if sinogram_geometry.angles.is_empty() {
        return Err(AstraError::UnsupportedGeometry("acquisition geometry has no angles".into()));
    }
    if volume_geometry.voxel_num_x == 0 || volume_geometry.voxel_num_y == 0 || sinogram_geometry.pixel_num_h == 0 {
        return Err(AstraError::UnsupportedGeometry("geometry has an empty axis".into()));
    }

    let projection = convert_projection(sinogram_geometry)?;
    let volume = convert_volume(volume_geometry, sinogram_geometry.pixel_size_h);
    debug!(
        "converted {}D geometry: volume {:?}, {} {:?}",
        dim,
        volume.shape(),
        projection.type_name(),
        projection.shape()
    );
    Ok(ProjectorDescriptor { volume, projection })
}

/// `slab_thickness`: 2D일 때 단일 슬라이스 두께. 검출기 행 높이와 같아야 선적분 크기가 맞는다
fn convert_volume(ig: &ImageGeometry, slab_thickness: f64) -> VolumeGeometry3D {
    let (slices, voxel_size_z, center_z) = if ig.spatial_ndim() == 3 {
        (ig.voxel_num_z, ig.voxel_size_z, ig.center_z)
    } else {
        (1, slab_thickness, 0.0)
    };
    let half = |n: usize, size: f64| n as f64 * size / 2.0;
    let hx = half(ig.voxel_num_x, ig.voxel_size_x);
    let hy = half(ig.voxel_num_y, ig.voxel_size_y);
    let hz = half(slices, voxel_size_z);
    VolumeGeometry3D {
        cols: ig.voxel_num_x,
        rows: ig.voxel_num_y,
        slices,
        window_min: [ig.center_x - hx, ig.center_y - hy, center_z - hz],
        window_max: [ig.center_x + hx, ig.center_y + hy, center_z + hz],
    }
}

fn convert_projection(ag: &AcquisitionGeometry) -> Result<ProjectionGeometry3D> {
    let three_d = ag.spatial_ndim() == 3;
    let det_rows = if three_d { ag.pixel_num_v } else { 1 };
    let pixel_size_v = if three_d { ag.pixel_size_v } else { ag.pixel_size_h };
    let offset_v = if three_d { ag.detector_offset_v } else { 0.0 };

    if ag.pixel_size_h <= 0.0 || pixel_size_v <= 0.0 {
        return Err(AstraError::UnsupportedGeometry(format!(
            "detector pixel size must be positive, got ({}, {})",
            ag.pixel_size_h, pixel_size_v
        )));
    }

    let axis_shift = Vector3::new(ag.rotation_axis_offset, 0.0, 0.0);
    let u0 = Vector3::new(ag.pixel_size_h, 0.0, 0.0);
    let v0 = Vector3::new(0.0, 0.0, pixel_size_v);
    let offset = Vector3::new(ag.detector_offset_h, 0.0, offset_v);

    let (kind, ray_or_source0, detector0) = match ag.beam {
        BeamGeometry::Parallel => (
            ProjectionKind::ParallelVec,
            Vector3::new(0.0, -1.0, 0.0),
            offset - axis_shift,
        ),
        BeamGeometry::Cone {
            source_to_center,
            center_to_detector,
        } => {
            if source_to_center <= 0.0 || center_to_detector < 0.0 {
                return Err(AstraError::UnsupportedGeometry(format!(
                    "cone beam distances must be positive, got source {} detector {}",
                    source_to_center, center_to_detector
                )));
            }
            (
                ProjectionKind::ConeVec,
                Vector3::new(0.0, -source_to_center, 0.0) - axis_shift,
                Vector3::new(0.0, center_to_detector, 0.0) + offset - axis_shift,
            )
        }
    };

    let vectors = ag
        .angles
        .iter()
        .map(|&theta| {
            let rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), theta);
            ProjectionVector::from_parts(
                rotation * ray_or_source0,
                rotation * detector0,
                rotation * u0,
                rotation * v0,
            )
        })
        .collect();

    Ok(ProjectionGeometry3D {
        kind,
        det_rows,
        det_cols: ag.pixel_num_h,
        vectors,
    })
}
