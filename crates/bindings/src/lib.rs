#![allow(clippy::useless_conversion)]
#![allow(clippy::too_many_arguments)]

use ndarray::Array2;
use numpy::{PyArray2, PyReadonlyArray2, PyUntypedArrayMethods, ToPyArray};
use pyo3::exceptions::{PyIOError, PyIndexError, PyTypeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyList, PySlice, PyTuple};

use trajseq_core::sequence::FrameSelection;
use trajseq_core::trajectory::DcdWriter;
use trajseq_core::{
    create_system_with_coordinates, iterative_align, AlignOptions, AlignedVirtualFrameSequence,
    AlignmentConfig, AtomicGroup, FrameSequence, FrameSlice, FrameSource, RigidTransform,
    SequenceOptions, TrajError, VirtualFrameSequence,
};

const MOVED: &str = "trajectory has been moved into a VirtualTrajectory";

// ============================================================================
// Helpers
// ============================================================================

fn py_err(e: TrajError) -> PyErr {
    match e {
        TrajError::OutOfRange { .. } => PyIndexError::new_err(e.to_string()),
        TrajError::Io(_) => PyIOError::new_err(e.to_string()),
        _ => PyValueError::new_err(e.to_string()),
    }
}

fn coords_to_array2(coords: &[[f64; 3]]) -> Array2<f64> {
    let mut result = Array2::<f64>::zeros((coords.len(), 3));
    for (i, &[x, y, z]) in coords.iter().enumerate() {
        result[[i, 0]] = x;
        result[[i, 1]] = y;
        result[[i, 2]] = z;
    }
    result
}

fn array2_to_coords(arr: &ndarray::ArrayView2<f64>) -> Vec<[f64; 3]> {
    let n = arr.shape()[0];
    (0..n)
        .map(|i| [arr[[i, 0]], arr[[i, 1]], arr[[i, 2]]])
        .collect()
}

fn frame_slice(slice: &Bound<'_, PySlice>) -> PyResult<FrameSlice> {
    let start: Option<isize> = slice.getattr("start")?.extract()?;
    let stop: Option<isize> = slice.getattr("stop")?.extract()?;
    let step: Option<isize> = slice.getattr("step")?.extract()?;
    Ok(FrameSlice::new(start, stop, step.unwrap_or(1)))
}

fn frame_selection(
    skip: usize,
    stride: usize,
    iterator: Option<Vec<usize>>,
) -> PyResult<FrameSelection> {
    let selection = match iterator {
        Some(frames) => FrameSelection::Explicit(frames),
        None => FrameSelection::Stride { skip, stride },
    };
    selection.validate().map_err(py_err)?;
    Ok(selection)
}

/// `seq[int]` gives one frame, `seq[slice]` a list of frames.
fn get_item<S: FrameSource>(
    seq: &mut S,
    py: Python<'_>,
    key: &Bound<'_, PyAny>,
) -> PyResult<PyObject> {
    if let Ok(slice) = key.downcast::<PySlice>() {
        let frames = seq.read_slice(frame_slice(slice)?).map_err(py_err)?;
        let frames: Vec<PyAtomicGroup> = frames
            .into_iter()
            .map(|inner| PyAtomicGroup { inner })
            .collect();
        return Ok(frames.into_py(py));
    }
    let index: isize = key.extract()?;
    let inner = seq.read_copy(index).map_err(py_err)?;
    Ok(PyAtomicGroup { inner }.into_py(py))
}

fn next_item<S: FrameSource>(seq: &mut S) -> PyResult<Option<PyAtomicGroup>> {
    match seq.next_frame() {
        None => Ok(None),
        Some(frame) => frame
            .map(|f| Some(PyAtomicGroup { inner: f.clone() }))
            .map_err(py_err),
    }
}

fn current_frame_of<S: FrameSource>(seq: &S) -> PyResult<PyAtomicGroup> {
    let inner = seq.current_frame().map_err(py_err)?.clone();
    Ok(PyAtomicGroup { inner })
}

/// Move the sequences out of `Trajectory` / `VirtualTrajectory` arguments.
///
/// Every argument is checked before any is taken, so a bad argument leaves
/// the others usable.
fn take_members(trajs: &Bound<'_, PyTuple>) -> PyResult<Vec<Box<dyn FrameSource>>> {
    let items: Vec<Bound<'_, PyAny>> = trajs.iter().collect();
    for (i, item) in items.iter().enumerate() {
        if items[..i].iter().any(|other| other.is(item)) {
            return Err(PyValueError::new_err(
                "the same trajectory cannot be added twice",
            ));
        }
        let available = if let Ok(t) = item.downcast::<PyTrajectory>() {
            t.try_borrow()?.inner.is_some()
        } else if let Ok(v) = item.downcast::<PyVirtualTrajectory>() {
            v.try_borrow()?.inner.is_some()
        } else {
            return Err(PyTypeError::new_err(
                "expected Trajectory or VirtualTrajectory arguments",
            ));
        };
        if !available {
            return Err(PyValueError::new_err(MOVED));
        }
    }

    let mut members: Vec<Box<dyn FrameSource>> = Vec::with_capacity(items.len());
    for item in &items {
        if let Ok(t) = item.downcast::<PyTrajectory>() {
            if let Some(seq) = t.try_borrow_mut()?.inner.take() {
                members.push(Box::new(seq));
            }
        } else if let Ok(v) = item.downcast::<PyVirtualTrajectory>() {
            if let Some(seq) = v.try_borrow_mut()?.inner.take() {
                members.push(Box::new(seq));
            }
        }
    }
    Ok(members)
}

// ============================================================================
// ATOMIC GROUP
// ============================================================================

#[pyclass(name = "AtomicGroup")]
#[derive(Clone)]
struct PyAtomicGroup {
    inner: AtomicGroup,
}

#[pymethods]
impl PyAtomicGroup {
    fn __len__(&self) -> usize {
        self.inner.len()
    }

    fn __repr__(&self) -> String {
        format!("<AtomicGroup with {} atoms>", self.inner.len())
    }

    /// Coordinates in nm as an (n_atoms, 3) array.
    #[getter]
    fn coords<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray2<f64>> {
        coords_to_array2(self.inner.coords()).to_pyarray_bound(py)
    }

    #[setter]
    fn set_coords(&mut self, coords: PyReadonlyArray2<'_, f64>) -> PyResult<()> {
        if coords.shape()[1] != 3 {
            return Err(PyValueError::new_err("coordinates must have shape (n_atoms, 3)"));
        }
        let coords = array2_to_coords(&coords.as_array());
        self.inner.set_coords(&coords).map_err(py_err)
    }

    #[getter]
    fn names(&self) -> Vec<String> {
        self.inner.atoms().iter().map(|a| a.name.clone()).collect()
    }

    #[getter]
    fn resnames(&self) -> Vec<String> {
        self.inner.atoms().iter().map(|a| a.resname.clone()).collect()
    }

    #[getter]
    fn resids(&self) -> Vec<i64> {
        self.inner.atoms().iter().map(|a| a.resid).collect()
    }

    #[getter]
    fn masses(&self) -> Vec<f64> {
        self.inner.atoms().iter().map(|a| a.mass).collect()
    }

    #[getter]
    fn periodic_box(&self) -> Option<[f64; 6]> {
        self.inner.periodic_box()
    }

    fn centroid(&self) -> [f64; 3] {
        self.inner.centroid()
    }

    fn center_of_mass(&self) -> [f64; 3] {
        self.inner.center_of_mass()
    }

    fn select(&self, expression: &str) -> PyResult<PyAtomicGroup> {
        let inner = self.inner.select(expression).map_err(py_err)?;
        Ok(PyAtomicGroup { inner })
    }

    fn select_indices(&self, expression: &str) -> PyResult<Vec<usize>> {
        self.inner.select_positions(expression).map_err(py_err)
    }

    fn copy(&self) -> PyAtomicGroup {
        self.clone()
    }

    fn rmsd(&self, other: &PyAtomicGroup) -> PyResult<f64> {
        self.inner.rmsd(&other.inner).map_err(py_err)
    }

    fn apply_transform(&mut self, transform: &PyTransform) {
        self.inner.apply_transform(&transform.inner);
    }
}

// ============================================================================
// TRANSFORM
// ============================================================================

#[pyclass(name = "Transform")]
#[derive(Clone)]
struct PyTransform {
    inner: RigidTransform,
}

#[pymethods]
impl PyTransform {
    /// Identity, or a pure translation.
    #[new]
    #[pyo3(signature = (translation=None))]
    fn new(translation: Option<[f64; 3]>) -> Self {
        let inner = translation.map_or_else(RigidTransform::identity, RigidTransform::from_translation);
        PyTransform { inner }
    }

    #[getter]
    fn rotation<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray2<f64>> {
        coords_to_array2(&self.inner.rotation).to_pyarray_bound(py)
    }

    #[getter]
    fn translation(&self) -> [f64; 3] {
        self.inner.translation
    }

    fn apply(&self, point: [f64; 3]) -> [f64; 3] {
        self.inner.apply(&point)
    }

    /// Transform that applies `self` first, then `other`.
    fn then(&self, other: &PyTransform) -> PyTransform {
        PyTransform {
            inner: self.inner.then(&other.inner),
        }
    }
}

// ============================================================================
// TRAJECTORY
// ============================================================================

#[pyclass(name = "Trajectory")]
struct PyTrajectory {
    inner: Option<FrameSequence>,
}

impl PyTrajectory {
    fn seq(&self) -> PyResult<&FrameSequence> {
        self.inner.as_ref().ok_or_else(|| PyValueError::new_err(MOVED))
    }

    fn seq_mut(&mut self) -> PyResult<&mut FrameSequence> {
        self.inner.as_mut().ok_or_else(|| PyValueError::new_err(MOVED))
    }
}

#[pymethods]
impl PyTrajectory {
    #[new]
    #[pyo3(signature = (fname, model, skip=0, stride=1, iterator=None, subset=None))]
    fn new(
        fname: &str,
        model: &PyAtomicGroup,
        skip: usize,
        stride: usize,
        iterator: Option<Vec<usize>>,
        subset: Option<String>,
    ) -> PyResult<Self> {
        let options = SequenceOptions {
            skip,
            stride,
            frames: iterator,
            subset,
        };
        let seq = FrameSequence::open(fname, model.inner.clone(), &options).map_err(py_err)?;
        Ok(PyTrajectory { inner: Some(seq) })
    }

    fn __len__(&self) -> PyResult<usize> {
        Ok(self.seq()?.len())
    }

    fn __getitem__(&mut self, py: Python<'_>, key: &Bound<'_, PyAny>) -> PyResult<PyObject> {
        get_item(self.seq_mut()?, py, key)
    }

    fn __iter__(mut slf: PyRefMut<'_, Self>) -> PyResult<PyRefMut<'_, Self>> {
        slf.seq_mut()?.reset();
        Ok(slf)
    }

    fn __next__(&mut self) -> PyResult<Option<PyAtomicGroup>> {
        next_item(self.seq_mut()?)
    }

    fn reset(&mut self) -> PyResult<()> {
        self.seq_mut()?.reset();
        Ok(())
    }

    fn current_index(&self) -> PyResult<Option<usize>> {
        Ok(self.seq()?.current_index())
    }

    fn current_real_index(&self) -> PyResult<Option<usize>> {
        Ok(self.seq()?.current_physical_index())
    }

    fn current_frame(&self) -> PyResult<PyAtomicGroup> {
        current_frame_of(self.seq()?)
    }

    fn set_subset(&mut self, selection: &str) -> PyResult<()> {
        self.seq_mut()?.set_subset(selection).map_err(py_err)
    }

    fn frame_list(&self) -> PyResult<Vec<usize>> {
        Ok(self.seq()?.frame_list().to_vec())
    }

    /// The full model, with the coordinates of the last frame read.
    fn model(&self) -> PyResult<PyAtomicGroup> {
        Ok(PyAtomicGroup {
            inner: self.seq()?.model().clone(),
        })
    }
}

// ============================================================================
// VIRTUAL TRAJECTORY
// ============================================================================

#[pyclass(name = "VirtualTrajectory")]
struct PyVirtualTrajectory {
    inner: Option<VirtualFrameSequence>,
}

impl PyVirtualTrajectory {
    fn seq(&self) -> PyResult<&VirtualFrameSequence> {
        self.inner.as_ref().ok_or_else(|| PyValueError::new_err(MOVED))
    }

    fn seq_mut(&mut self) -> PyResult<&mut VirtualFrameSequence> {
        self.inner.as_mut().ok_or_else(|| PyValueError::new_err(MOVED))
    }
}

#[pymethods]
impl PyVirtualTrajectory {
    #[new]
    #[pyo3(signature = (*trajs, skip=0, stride=1, iterator=None))]
    fn new(
        trajs: &Bound<'_, PyTuple>,
        skip: usize,
        stride: usize,
        iterator: Option<Vec<usize>>,
    ) -> PyResult<Self> {
        let selection = frame_selection(skip, stride, iterator)?;
        let members = take_members(trajs)?;
        let seq = VirtualFrameSequence::with_selection(members, selection).map_err(py_err)?;
        Ok(PyVirtualTrajectory { inner: Some(seq) })
    }

    #[pyo3(signature = (*trajs))]
    fn append(&mut self, trajs: &Bound<'_, PyTuple>) -> PyResult<()> {
        if self.inner.is_none() {
            return Err(PyValueError::new_err(MOVED));
        }
        let members = take_members(trajs)?;
        self.seq_mut()?.append(members);
        Ok(())
    }

    fn __len__(&self) -> PyResult<usize> {
        Ok(self.seq()?.len())
    }

    fn __getitem__(&mut self, py: Python<'_>, key: &Bound<'_, PyAny>) -> PyResult<PyObject> {
        get_item(self.seq_mut()?, py, key)
    }

    fn __iter__(mut slf: PyRefMut<'_, Self>) -> PyResult<PyRefMut<'_, Self>> {
        slf.seq_mut()?.reset();
        Ok(slf)
    }

    fn __next__(&mut self) -> PyResult<Option<PyAtomicGroup>> {
        next_item(self.seq_mut()?)
    }

    fn reset(&mut self) -> PyResult<()> {
        self.seq_mut()?.reset();
        Ok(())
    }

    fn current_index(&self) -> PyResult<Option<usize>> {
        Ok(self.seq()?.current_index())
    }

    fn current_frame(&self) -> PyResult<PyAtomicGroup> {
        current_frame_of(self.seq()?)
    }

    fn set_subset(&mut self, selection: &str) -> PyResult<()> {
        self.seq_mut()?.set_subset(selection).map_err(py_err)
    }

    fn count_trajectory_frames(&self) -> PyResult<usize> {
        Ok(self.seq()?.count_total_raw_frames())
    }

    fn verify_models(&self) -> PyResult<()> {
        self.seq()?.verify_models().map_err(py_err)
    }

    #[getter]
    fn n_trajectories(&self) -> PyResult<usize> {
        Ok(self.seq()?.n_members())
    }
}

// ============================================================================
// ALIGNED VIRTUAL TRAJECTORY
// ============================================================================

#[pyclass(name = "AlignedVirtualTrajectory")]
struct PyAlignedVirtualTrajectory {
    inner: AlignedVirtualFrameSequence,
}

#[pymethods]
impl PyAlignedVirtualTrajectory {
    #[new]
    #[pyo3(signature = (*trajs, skip=0, stride=1, iterator=None, alignwith="name CA", tolerance=1e-6, max_iterations=1000))]
    fn new(
        trajs: &Bound<'_, PyTuple>,
        skip: usize,
        stride: usize,
        iterator: Option<Vec<usize>>,
        alignwith: &str,
        tolerance: f64,
        max_iterations: usize,
    ) -> PyResult<Self> {
        let selection = frame_selection(skip, stride, iterator)?;
        let config = AlignmentConfig {
            selection: alignwith.to_string(),
            options: AlignOptions {
                tolerance,
                max_iterations,
            },
        };
        config.options.validate().map_err(py_err)?;
        let members = take_members(trajs)?;
        let virt = VirtualFrameSequence::with_selection(members, selection).map_err(py_err)?;
        let inner = AlignedVirtualFrameSequence::with_config(virt, config).map_err(py_err)?;
        Ok(PyAlignedVirtualTrajectory { inner })
    }

    #[pyo3(signature = (*trajs))]
    fn append(&mut self, trajs: &Bound<'_, PyTuple>) -> PyResult<()> {
        let members = take_members(trajs)?;
        self.inner.append(members);
        Ok(())
    }

    fn align_with(&mut self, selection: &str) {
        self.inner.align_with(selection);
    }

    /// Run the alignment now instead of on first access.
    fn align(&mut self) -> PyResult<()> {
        self.inner.align().map_err(py_err)
    }

    #[getter]
    fn aligned(&self) -> bool {
        self.inner.is_aligned()
    }

    #[getter]
    fn rmsd(&self) -> Option<f64> {
        self.inner.alignment_stats().map(|s| s.rmsd)
    }

    #[getter]
    fn iterations(&self) -> Option<usize> {
        self.inner.alignment_stats().map(|s| s.iterations)
    }

    fn transforms(&self) -> Option<Vec<PyTransform>> {
        self.inner
            .transforms()
            .map(|ts| ts.iter().map(|&inner| PyTransform { inner }).collect())
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }

    fn __getitem__(&mut self, py: Python<'_>, key: &Bound<'_, PyAny>) -> PyResult<PyObject> {
        get_item(&mut self.inner, py, key)
    }

    fn __iter__(mut slf: PyRefMut<'_, Self>) -> PyRefMut<'_, Self> {
        slf.inner.reset();
        slf
    }

    fn __next__(&mut self) -> PyResult<Option<PyAtomicGroup>> {
        next_item(&mut self.inner)
    }

    fn reset(&mut self) {
        self.inner.reset();
    }

    fn current_index(&self) -> Option<usize> {
        self.inner.current_index()
    }

    fn current_frame(&self) -> PyResult<PyAtomicGroup> {
        current_frame_of(&self.inner)
    }

    fn set_subset(&mut self, selection: &str) -> PyResult<()> {
        self.inner.set_subset(selection).map_err(py_err)
    }

    fn count_trajectory_frames(&self) -> usize {
        self.inner.count_total_raw_frames()
    }

    fn verify_models(&self) -> PyResult<()> {
        self.inner.verify_models().map_err(py_err)
    }
}

// ============================================================================
// FUNCTIONS
// ============================================================================

/// Read a model; coordinates may come from a second file.
#[pyfunction]
#[pyo3(name = "create_system", signature = (path, coordinates=None))]
fn create_system_py(path: &str, coordinates: Option<&str>) -> PyResult<PyAtomicGroup> {
    let inner = match coordinates {
        Some(crd) => create_system_with_coordinates(path, crd),
        None => trajseq_core::create_system(path),
    }
    .map_err(py_err)?;
    Ok(PyAtomicGroup { inner })
}

/// Align a list of groups onto their common average, in place.
///
/// Returns `(transforms, rmsd, iterations)`.
#[pyfunction]
#[pyo3(name = "iterative_align", signature = (frames, tolerance=1e-6, max_iterations=1000))]
fn iterative_align_py(
    frames: &Bound<'_, PyList>,
    tolerance: f64,
    max_iterations: usize,
) -> PyResult<(Vec<PyTransform>, f64, usize)> {
    let mut groups = Vec::with_capacity(frames.len());
    for item in frames.iter() {
        groups.push(item.downcast::<PyAtomicGroup>()?.try_borrow()?.inner.clone());
    }
    let options = AlignOptions {
        tolerance,
        max_iterations,
    };
    let result = iterative_align(&mut groups, &options).map_err(py_err)?;
    for (item, group) in frames.iter().zip(groups) {
        item.downcast::<PyAtomicGroup>()?.try_borrow_mut()?.inner = group;
    }
    let transforms = result
        .transforms
        .into_iter()
        .map(|inner| PyTransform { inner })
        .collect();
    Ok((transforms, result.rmsd, result.iterations))
}

/// Write groups as consecutive DCD frames.
#[pyfunction]
#[pyo3(name = "write_dcd")]
fn write_dcd_py(path: &str, frames: Vec<PyRef<'_, PyAtomicGroup>>) -> PyResult<usize> {
    let first = frames
        .first()
        .ok_or_else(|| PyValueError::new_err("No frames to write"))?;
    let has_unit_cell = first.inner.periodic_box().is_some();
    let mut writer = DcdWriter::create(path, first.inner.len(), has_unit_cell).map_err(py_err)?;
    for frame in &frames {
        writer.write_frame(&frame.inner).map_err(py_err)?;
    }
    let written = writer.frames_written();
    writer.finish().map_err(py_err)?;
    Ok(written)
}

// ============================================================================
// MODULE DEFINITION
// ============================================================================

#[pymodule]
fn trajseq(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Atoms
    m.add_class::<PyAtomicGroup>()?;
    m.add_class::<PyTransform>()?;
    m.add_function(wrap_pyfunction!(create_system_py, m)?)?;

    // Sequences
    m.add_class::<PyTrajectory>()?;
    m.add_class::<PyVirtualTrajectory>()?;
    m.add_class::<PyAlignedVirtualTrajectory>()?;

    // Alignment and output
    m.add_function(wrap_pyfunction!(iterative_align_py, m)?)?;
    m.add_function(wrap_pyfunction!(write_dcd_py, m)?)?;

    Ok(())
}
