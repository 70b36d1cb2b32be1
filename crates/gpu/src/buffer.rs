use crate::{BufferHandle, BufferTarget, Context, GpuError};

/// Numbers a [`Buffer`] can hold: `f32` for vertex data, `u32` for indices.
pub trait BufferElement: Copy + bytemuck::Pod {
    const TARGET: BufferTarget;

    fn upload(context: &mut Context, data: &[Self]) -> Result<BufferHandle, GpuError>;
}

impl BufferElement for f32 {
    const TARGET: BufferTarget = BufferTarget::Vertex;

    fn upload(context: &mut Context, data: &[Self]) -> Result<BufferHandle, GpuError> {
        context.device_mut().create_vertex_buffer(data)
    }
}

impl BufferElement for u32 {
    const TARGET: BufferTarget = BufferTarget::Index;

    fn upload(context: &mut Context, data: &[Self]) -> Result<BufferHandle, GpuError> {
        context.device_mut().create_index_buffer(data)
    }
}

/// A list of fixed-width records, flattened and uploaded by
/// [`compile`](Self::compile).
#[derive(Debug, Clone)]
pub struct Buffer<T> {
    arity: usize,
    records: Vec<Vec<T>>,
    handle: Option<BufferHandle>,
    len: usize,
}

impl<T: BufferElement> Buffer<T> {
    /// `arity` is the number of values in every record (3 for positions,
    /// 3 for triangles, and so on).
    #[must_use]
    pub fn new(arity: usize) -> Self {
        Self {
            arity,
            records: Vec::new(),
            handle: None,
            len: 0,
        }
    }

    #[must_use]
    pub fn from_records<const N: usize>(records: &[[T; N]]) -> Self {
        let mut buffer = Self::new(N);
        buffer.records = records.iter().map(|r| r.to_vec()).collect();
        buffer
    }

    pub fn push(&mut self, record: &[T]) {
        self.records.push(record.to_vec());
    }

    #[must_use]
    pub fn target(&self) -> BufferTarget {
        T::TARGET
    }

    #[must_use]
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Device handle, once compiled.
    #[must_use]
    pub fn handle(&self) -> Option<BufferHandle> {
        self.handle
    }

    /// Number of values uploaded by the last compile.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of whole records uploaded by the last compile.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.len / self.arity.max(1)
    }

    /// Flattens the records and uploads them.
    ///
    /// # Errors
    ///
    /// [`GpuError::InconsistentBuffer`] when the flattened length is not a
    /// multiple of the arity, or any device error from the upload.
    #[allow(clippy::cast_precision_loss)]
    pub fn compile(&mut self, context: &mut Context) -> Result<BufferHandle, GpuError> {
        let flat: Vec<T> = self.records.iter().flatten().copied().collect();
        if self.arity == 0 || flat.len() % self.arity != 0 {
            return Err(GpuError::InconsistentBuffer {
                average: flat.len() as f32 / self.records.len().max(1) as f32,
            });
        }
        let handle = T::upload(context, &flat)?;
        self.handle = Some(handle);
        self.len = flat.len();
        Ok(handle)
    }
}
