pub mod annotated_frame_writer;
pub mod frame_processor;
pub mod latest_result;
pub mod live_session;
pub mod pipeline_logger;
