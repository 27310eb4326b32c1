use crate::error::DataError;

/// Keeps last `num_stack` observation frames concatenated in one vector, oldest first.
/// New frame pushes out the oldest one. Starts (and is reset to) all zeros.
///
/// ```
/// use moa_core::frame_stack::FrameStack;
/// let mut stack = FrameStack::new(2, 3);
/// stack.push(&[1.0, 2.0]).unwrap();
/// stack.push(&[3.0, 4.0]).unwrap();
/// assert_eq!(stack.as_slice(), &[0.0, 0.0, 1.0, 2.0, 3.0, 4.0]);
/// ```
#[derive(Debug, Clone)]
pub struct FrameStack{
    frame_size: usize,
    num_stack: usize,
    buffer: Vec<f32>,
}

impl FrameStack{
    pub fn new(frame_size: usize, num_stack: usize) -> Self{
        Self{
            frame_size,
            num_stack,
            buffer: vec![0.0; frame_size * num_stack],
        }
    }

    pub fn push(&mut self, frame: &[f32]) -> Result<(), DataError>{
        if frame.len() != self.frame_size{
            return Err(DataError::LengthMismatch {
                left: frame.len(),
                right: self.frame_size,
                context: "Pushing frame to frame stack".into(),
            })
        }
        if self.num_stack > 1{
            self.buffer.copy_within(self.frame_size.., 0);
        }
        let tail = self.buffer.len() - self.frame_size;
        self.buffer[tail..].copy_from_slice(frame);
        Ok(())
    }

    /// Zeroes all stacked frames, used when episode ends.
    pub fn clear(&mut self){
        self.buffer.iter_mut().for_each(|v| *v = 0.0);
    }

    pub fn as_slice(&self) -> &[f32]{
        &self.buffer
    }

    /// Length of stacked vector (`frame_size * num_stack`).
    pub fn len(&self) -> usize{
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool{
        self.buffer.is_empty()
    }

    pub fn frame_size(&self) -> usize{
        self.frame_size
    }

    pub fn num_stack(&self) -> usize{
        self.num_stack
    }
}

#[cfg(test)]
mod tests{
    use crate::frame_stack::FrameStack;

    #[test]
    fn single_frame_is_replaced(){
        let mut stack = FrameStack::new(3, 1);
        stack.push(&[1.0, 2.0, 3.0]).unwrap();
        stack.push(&[4.0, 5.0, 6.0]).unwrap();
        assert_eq!(stack.as_slice(), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn oldest_frame_falls_out(){
        let mut stack = FrameStack::new(1, 3);
        for v in [1.0, 2.0, 3.0, 4.0]{
            stack.push(&[v]).unwrap();
        }
        assert_eq!(stack.as_slice(), &[2.0, 3.0, 4.0]);
        stack.clear();
        assert_eq!(stack.as_slice(), &[0.0, 0.0, 0.0]);
        stack.push(&[9.0]).unwrap();
        assert_eq!(stack.as_slice(), &[0.0, 0.0, 9.0]);
    }

    #[test]
    fn wrong_frame_size_is_rejected(){
        let mut stack = FrameStack::new(4, 2);
        assert!(stack.push(&[1.0, 2.0]).is_err());
        assert_eq!(stack.len(), 8);
    }
}
