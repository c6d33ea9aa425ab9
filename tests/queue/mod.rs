mod pipeline;
mod redelivery;
