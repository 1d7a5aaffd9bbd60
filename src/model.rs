//! Modal data model: the single stateful owner of the loaded matrices

use std::collections::HashMap;

use nalgebra::{DMatrix, DMatrixView, DVector};

use crate::analysis::MotionKind;
use crate::error::{SolverError, SolverResult};

/// One of the six stress tensor components
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StressComponent {
    Sx,
    Sy,
    Sz,
    Sxy,
    Syz,
    Sxz,
}

impl StressComponent {
    pub const ALL: [StressComponent; 6] = [
        StressComponent::Sx,
        StressComponent::Sy,
        StressComponent::Sz,
        StressComponent::Sxy,
        StressComponent::Syz,
        StressComponent::Sxz,
    ];
}

/// Modal stress component matrices, node rows x mode columns
#[derive(Debug, Clone)]
pub struct ModalStressSet {
    pub sx: DMatrix<f64>,
    pub sy: DMatrix<f64>,
    pub sz: DMatrix<f64>,
    pub sxy: DMatrix<f64>,
    pub syz: DMatrix<f64>,
    pub sxz: DMatrix<f64>,
}

impl ModalStressSet {
    pub fn component(&self, component: StressComponent) -> &DMatrix<f64> {
        match component {
            StressComponent::Sx => &self.sx,
            StressComponent::Sy => &self.sy,
            StressComponent::Sz => &self.sz,
            StressComponent::Sxy => &self.sxy,
            StressComponent::Syz => &self.syz,
            StressComponent::Sxz => &self.sxz,
        }
    }

    fn matrices(&self) -> [(&'static str, &DMatrix<f64>); 6] {
        [
            ("sx", &self.sx),
            ("sy", &self.sy),
            ("sz", &self.sz),
            ("sxy", &self.sxy),
            ("syz", &self.syz),
            ("sxz", &self.sxz),
        ]
    }
}

/// Modal motion component matrices (ux, uy, uz), node rows x mode columns.
///
/// The same shape serves deformation, velocity and acceleration inputs.
#[derive(Debug, Clone)]
pub struct ModalMotionSet {
    pub ux: DMatrix<f64>,
    pub uy: DMatrix<f64>,
    pub uz: DMatrix<f64>,
}

impl ModalMotionSet {
    fn matrices(&self) -> [(&'static str, &DMatrix<f64>); 3] {
        [("ux", &self.ux), ("uy", &self.uy), ("uz", &self.uz)]
    }
}

/// Static per-node stress baselines added on top of the dynamic
/// reconstruction, one value per node per component.
#[derive(Debug, Clone)]
pub struct SteadyStateSet {
    pub sx: DVector<f64>,
    pub sy: DVector<f64>,
    pub sz: DVector<f64>,
    pub sxy: DVector<f64>,
    pub syz: DVector<f64>,
    pub sxz: DVector<f64>,
}

impl SteadyStateSet {
    pub fn component(&self, component: StressComponent) -> &DVector<f64> {
        match component {
            StressComponent::Sx => &self.sx,
            StressComponent::Sy => &self.sy,
            StressComponent::Sz => &self.sz,
            StressComponent::Sxy => &self.sxy,
            StressComponent::Syz => &self.syz,
            StressComponent::Sxz => &self.sxz,
        }
    }

    fn vectors(&self) -> [(&'static str, &DVector<f64>); 6] {
        [
            ("sx", &self.sx),
            ("sy", &self.sy),
            ("sz", &self.sz),
            ("sxy", &self.sxy),
            ("syz", &self.syz),
            ("sxz", &self.sxz),
        ]
    }
}

/// The loaded modal data set: coordinate matrix, time axis, component
/// matrices and node identity. Immutable once built; every run reads it
/// through cheap views, concurrently if it wants to.
#[derive(Debug, Clone)]
pub struct ModalModel {
    /// Modal coordinates, mode rows x time columns
    coord: DMatrix<f64>,
    /// Physical time of each sample, parallel to the coordinate columns
    times: Vec<f64>,
    node_ids: Vec<u64>,
    node_coords: Vec<[f64; 3]>,
    node_index: HashMap<u64, usize>,
    stress: ModalStressSet,
    deformation: Option<ModalMotionSet>,
    velocity: Option<ModalMotionSet>,
    acceleration: Option<ModalMotionSet>,
    steady_state: Option<SteadyStateSet>,
}

impl ModalModel {
    /// Build a model from validated arrays.
    ///
    /// Fails with `ShapeMismatch` when any matrix disagrees with the node
    /// set or the coordinate matrix; nothing is recomputed on read later.
    pub fn new(
        coord: DMatrix<f64>,
        times: Vec<f64>,
        node_ids: Vec<u64>,
        node_coords: Vec<[f64; 3]>,
        stress: ModalStressSet,
    ) -> SolverResult<Self> {
        let num_modes = coord.nrows();
        let num_times = coord.ncols();

        if num_modes == 0 || num_times == 0 {
            return Err(SolverError::ShapeMismatch(format!(
                "coordinate matrix is {num_modes}x{num_times}; at least one mode and one time sample are required"
            )));
        }
        if times.len() != num_times {
            return Err(SolverError::ShapeMismatch(format!(
                "time axis has {} samples but the coordinate matrix has {} columns",
                times.len(),
                num_times
            )));
        }
        if node_coords.len() != node_ids.len() {
            return Err(SolverError::ShapeMismatch(format!(
                "{} node coordinates for {} node ids",
                node_coords.len(),
                node_ids.len()
            )));
        }
        for (name, m) in stress.matrices() {
            Self::check_component(name, m, node_ids.len(), num_modes)?;
        }

        let node_index = node_ids
            .iter()
            .enumerate()
            .map(|(i, &id)| (id, i))
            .collect();

        Ok(Self {
            coord,
            times,
            node_ids,
            node_coords,
            node_index,
            stress,
            deformation: None,
            velocity: None,
            acceleration: None,
            steady_state: None,
        })
    }

    /// Attach modal deformation components
    pub fn with_deformation(mut self, set: ModalMotionSet) -> SolverResult<Self> {
        self.check_motion("deformation", &set)?;
        self.deformation = Some(set);
        Ok(self)
    }

    /// Attach modal velocity components
    pub fn with_velocity(mut self, set: ModalMotionSet) -> SolverResult<Self> {
        self.check_motion("velocity", &set)?;
        self.velocity = Some(set);
        Ok(self)
    }

    /// Attach modal acceleration components
    pub fn with_acceleration(mut self, set: ModalMotionSet) -> SolverResult<Self> {
        self.check_motion("acceleration", &set)?;
        self.acceleration = Some(set);
        Ok(self)
    }

    /// Attach steady-state stress offsets
    pub fn with_steady_state(mut self, set: SteadyStateSet) -> SolverResult<Self> {
        for (name, v) in set.vectors() {
            if v.len() != self.num_nodes() {
                return Err(SolverError::ShapeMismatch(format!(
                    "steady-state {} has {} entries for {} nodes",
                    name,
                    v.len(),
                    self.num_nodes()
                )));
            }
        }
        self.steady_state = Some(set);
        Ok(self)
    }

    fn check_component(
        name: &str,
        m: &DMatrix<f64>,
        num_nodes: usize,
        num_modes: usize,
    ) -> SolverResult<()> {
        if m.nrows() != num_nodes {
            return Err(SolverError::ShapeMismatch(format!(
                "modal {} has {} rows for {} nodes",
                name,
                m.nrows(),
                num_nodes
            )));
        }
        if m.ncols() != num_modes {
            return Err(SolverError::ShapeMismatch(format!(
                "modal {} has {} mode columns but the coordinate matrix has {} modes",
                name,
                m.ncols(),
                num_modes
            )));
        }
        Ok(())
    }

    fn check_motion(&self, label: &str, set: &ModalMotionSet) -> SolverResult<()> {
        for (name, m) in set.matrices() {
            Self::check_component(name, m, self.num_nodes(), self.num_modes()).map_err(|_| {
                SolverError::ShapeMismatch(format!(
                    "modal {label} {name} is {}x{}, expected {}x{}",
                    m.nrows(),
                    m.ncols(),
                    self.num_nodes(),
                    self.num_modes()
                ))
            })?;
        }
        Ok(())
    }

    // ========================
    // Dimensions and lookups
    // ========================

    pub fn num_nodes(&self) -> usize {
        self.node_ids.len()
    }

    pub fn num_modes(&self) -> usize {
        self.coord.nrows()
    }

    pub fn num_time_samples(&self) -> usize {
        self.coord.ncols()
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn node_ids(&self) -> &[u64] {
        &self.node_ids
    }

    pub fn node_coords(&self) -> &[[f64; 3]] {
        &self.node_coords
    }

    /// Row index of a node id
    pub fn node_row(&self, node_id: u64) -> SolverResult<usize> {
        self.node_index
            .get(&node_id)
            .copied()
            .ok_or(SolverError::NodeNotFound(node_id))
    }

    /// Reject a mode skip that leaves no modes to reconstruct from
    pub fn validate_mode_skip(&self, mode_skip: usize) -> SolverResult<()> {
        if mode_skip >= self.num_modes() {
            return Err(SolverError::InvalidModeSkip {
                skip: mode_skip,
                num_modes: self.num_modes(),
            });
        }
        Ok(())
    }

    // ========================
    // Read-only views
    // ========================

    pub fn coord(&self) -> &DMatrix<f64> {
        &self.coord
    }

    /// Coordinate matrix with the first `mode_skip` mode rows excluded
    pub fn coord_skipped(&self, mode_skip: usize) -> DMatrixView<'_, f64> {
        self.coord
            .view((mode_skip, 0), (self.num_modes() - mode_skip, self.num_time_samples()))
    }

    pub fn stress(&self) -> &ModalStressSet {
        &self.stress
    }

    pub fn motion(&self, kind: MotionKind) -> Option<&ModalMotionSet> {
        match kind {
            MotionKind::Deformation => self.deformation.as_ref(),
            MotionKind::Velocity => self.velocity.as_ref(),
            MotionKind::Acceleration => self.acceleration.as_ref(),
        }
    }

    pub fn steady_state(&self) -> Option<&SteadyStateSet> {
        self.steady_state.as_ref()
    }
}
